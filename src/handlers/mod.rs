pub mod demo_handlers;

pub use demo_handlers::{
    csrf_token_handler, demo_router, echo_handler, health_handler, index_handler, submit_handler,
};
