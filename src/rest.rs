//! REST controllers.
//!
//! A [`RestController`] bundles the handlers of one resource under a prefix.
//! [`Router::controller`](crate::router::Router::controller) registers them:
//!
//! | operation | method | path                     |
//! |-----------|--------|--------------------------|
//! | list      | GET    | `prefix`                 |
//! | create    | POST   | `prefix`                 |
//! | get       | GET    | `prefix/{RESTFUL_KEY}`   |
//! | update    | PUT    | `prefix/{RESTFUL_KEY}`   |
//! | delete    | DELETE | `prefix/{RESTFUL_KEY}`   |
//!
//! Operations returning `None` are not registered. Handlers read the key
//! with [`Context::key`](crate::context::Context::key).

use crate::context::Handler;

/// Path parameter name bound to the resource key.
pub const REST_KEY: &str = "RESTFUL_KEY";

pub trait RestController: Send + Sync {
    /// Path prefix of the resource, such as `/users`.
    fn prefix(&self) -> &str;

    fn list(&self) -> Option<Handler> {
        None
    }

    fn get(&self) -> Option<Handler> {
        None
    }

    fn create(&self) -> Option<Handler> {
        None
    }

    fn update(&self) -> Option<Handler> {
        None
    }

    fn delete(&self) -> Option<Handler> {
        None
    }
}
