use super::Router;
use crate::path::trim_special_chars;

/// A set of routers mounted under a shared path prefix.
///
/// The prefix is cleaned like a route pattern; `""` and `"/"` both mean "no
/// prefix", in which case the routers are merged as independent top-level
/// routers.
#[derive(Clone, Default, Debug)]
pub struct Group {
    prefix: String,
    routers: Vec<Router>,
}

impl Group {
    #[must_use]
    pub fn new(prefix: &str, routers: Vec<Router>) -> Self {
        let prefix = trim_special_chars(prefix);
        let prefix = if prefix == "/" { String::new() } else { prefix };
        Self { prefix, routers }
    }

    pub fn add(&mut self, router: Router) -> &mut Self {
        self.routers.push(router);
        self
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn routers(&self) -> &[Router] {
        &self.routers
    }
}
