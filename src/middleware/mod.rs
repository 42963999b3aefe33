pub mod csrf;

pub use csrf::{
    csrf_enforcement_middleware, csrf_issuance_middleware, is_safe_method, issuance_cookie,
};
