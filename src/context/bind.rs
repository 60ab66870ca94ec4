use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::Context;
use crate::error::{Error, HandlerResult};

/// Field names and values written when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReply {
    pub message_name: String,
    /// Fallback message when the validator reports none.
    pub message: String,
    pub code_name: String,
    pub code: i64,
}

impl Default for ValidationReply {
    fn default() -> Self {
        Self {
            message_name: "message".to_string(),
            message: "Parameters is invalid".to_string(),
            code_name: "code".to_string(),
            code: 500,
        }
    }
}

impl Context {
    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] on malformed input.
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(&self.request().body)?)
    }

    /// Deserialize the body as XML.
    ///
    /// # Errors
    ///
    /// [`Error::Xml`] on malformed input.
    pub fn bind_xml<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let body = String::from_utf8_lossy(&self.request().body);
        Ok(quick_xml::de::from_str(&body)?)
    }

    /// Deserialize the body as YAML.
    ///
    /// # Errors
    ///
    /// [`Error::Yaml`] on malformed input.
    pub fn bind_yaml<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_yaml::from_slice(&self.request().body)?)
    }

    /// Deserialize the body according to its content type: XML and YAML
    /// media types use their decoders, everything else is read as JSON.
    ///
    /// # Errors
    ///
    /// The decoder's error on malformed input.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, Error> {
        match crate::mime::essence(self.request().content_type()).as_str() {
            "application/xml" | "text/xml" => self.bind_xml(),
            "application/yaml" | "application/x-yaml" | "text/yaml" | "text/x-yaml" => {
                self.bind_yaml()
            }
            _ => self.bind_json(),
        }
    }

    /// Validate `value` and run `call` when it passes; otherwise write the
    /// default JSON failure reply and skip `call`.
    ///
    /// # Errors
    ///
    /// Whatever `call` returns.
    pub fn validate<T, F>(&mut self, value: &T, call: F) -> HandlerResult
    where
        T: garde::Validate,
        T::Context: Default,
        F: FnOnce(&mut Self) -> HandlerResult,
    {
        self.validate_with(value, &ValidationReply::default(), call)
    }

    /// [`Context::validate`] with custom reply fields.
    ///
    /// # Errors
    ///
    /// Whatever `call` returns, or [`Error::Json`] if the reply cannot be
    /// serialized.
    pub fn validate_with<T, F>(&mut self, value: &T, reply: &ValidationReply, call: F) -> HandlerResult
    where
        T: garde::Validate,
        T::Context: Default,
        F: FnOnce(&mut Self) -> HandlerResult,
    {
        match value.validate() {
            Ok(()) => call(self),
            Err(report) => {
                let mut message = report.to_string().trim().to_string();
                if message.is_empty() {
                    message.clone_from(&reply.message);
                }
                let mut body = Map::new();
                body.insert(reply.message_name.clone(), Value::String(message));
                body.insert(reply.code_name.clone(), Value::from(reply.code));
                self.json(&body)
            }
        }
    }

    /// Bind the body, validate it, and hand it to `call` when valid.
    ///
    /// # Errors
    ///
    /// The decoder's error on malformed input, or whatever `call` returns.
    pub fn bind_and_validate<T, F>(&mut self, call: F) -> HandlerResult
    where
        T: DeserializeOwned + garde::Validate,
        T::Context: Default,
        F: FnOnce(&mut Self, T) -> HandlerResult,
    {
        let value: T = self.bind()?;
        match value.validate() {
            Ok(()) => call(self, value),
            Err(_) => self.validate(&value, |_| Ok(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ListenerRegistry, Templates};
    use crate::server::Request;
    use garde::Validate;
    use http::Method;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Deserialize, Validate, PartialEq)]
    struct NewUser {
        #[garde(length(min = 3))]
        name: String,
        #[garde(range(min = 18))]
        age: u32,
    }

    fn ctx(content_type: &str, body: &str) -> Context {
        let mut c = Context::new(Arc::new(ListenerRegistry::new()));
        let req = Request::new(Method::POST, "/users")
            .with_header("Content-Type", content_type)
            .with_body(body);
        c.allocate(req, Arc::new(Templates::default()));
        c
    }

    #[test]
    fn test_bind_by_content_type() {
        let expected = NewUser {
            name: "alice".into(),
            age: 30,
        };
        let c = ctx("application/json", r#"{"name":"alice","age":30}"#);
        assert_eq!(c.bind::<NewUser>().unwrap(), expected);

        let c = ctx(
            "application/xml",
            "<NewUser><name>alice</name><age>30</age></NewUser>",
        );
        assert_eq!(c.bind::<NewUser>().unwrap(), expected);

        let c = ctx("application/yaml", "name: alice\nage: 30\n");
        assert_eq!(c.bind::<NewUser>().unwrap(), expected);
    }

    #[test]
    fn test_bind_malformed_json_is_error() {
        let c = ctx("application/json", "{nope");
        assert!(matches!(c.bind_json::<NewUser>(), Err(Error::Json(_))));
    }

    #[test]
    fn test_validate_runs_call_when_valid() {
        let mut c = ctx("application/json", "");
        let user = NewUser {
            name: "alice".into(),
            age: 30,
        };
        c.validate(&user, |ctx| {
            ctx.text("created");
            Ok(())
        })
        .unwrap();
        assert_eq!(c.response().body_str(), "created");
    }

    #[test]
    fn test_validate_writes_reply_when_invalid() {
        let mut c = ctx("application/json", "");
        let user = NewUser {
            name: "al".into(),
            age: 3,
        };
        c.validate(&user, |ctx| {
            ctx.text("created");
            Ok(())
        })
        .unwrap();
        let body: Value = serde_json::from_str(&c.response().body_str()).unwrap();
        assert_eq!(body["code"], 500);
        let msg = body["message"].as_str().unwrap();
        assert!(msg.contains("name"));
        assert!(msg.contains("age"));
    }

    #[test]
    fn test_bind_and_validate() {
        let mut c = ctx("application/json", r#"{"name":"bob","age":40}"#);
        c.bind_and_validate(|ctx, user: NewUser| {
            ctx.text(&user.name);
            Ok(())
        })
        .unwrap();
        assert_eq!(c.response().body_str(), "bob");

        let mut c = ctx("application/json", r#"{"name":"bob","age":4}"#);
        let reply = ValidationReply::default();
        c.bind_and_validate(|ctx, _user: NewUser| {
            ctx.text("unreachable");
            Ok(())
        })
        .unwrap();
        let body: Value = serde_json::from_str(&c.response().body_str()).unwrap();
        assert_eq!(body[&reply.code_name], 500);
    }
}
