//! Application builder.
//!
//! [`App`] collects routes, groups, REST controllers, middlewares and
//! settings, then [`App::build`]s the [`Dispatcher`] or serves it with
//! [`App::start`] / [`App::run`].
//!
//! Built-in middlewares run in a fixed order ahead of user middlewares:
//! session (when configured), header (on by default), logger, recovery.
//!
//! ```rust
//! use brrtweb::App;
//! use brrtweb::server::Request;
//! use http::Method;
//!
//! let mut app = App::new();
//! app.use_recovery().get("/hello/{name}", |ctx| {
//!     let name = ctx.param("name");
//!     ctx.text(&format!("hello {name}"));
//!     Ok(())
//! });
//! let dispatcher = app.build();
//! let res = dispatcher.serve(Request::new(Method::GET, "/hello/ann")).unwrap();
//! assert_eq!(res.body_str(), "hello ann");
//! assert_eq!(res.header("server"), Some("brrtweb"));
//! ```

use std::collections::HashMap;
use std::io;
use std::net::ToSocketAddrs;
use std::sync::Arc;

use tracing::info;

use crate::config::{AppConfig, ConfigError};
use crate::context::{
    AssetSource, Context, ContextPool, Handler, Listener, ListenerRegistry, Templates,
};
use crate::dispatcher::Dispatcher;
use crate::error::HandlerResult;
use crate::middleware::{
    CorsMiddleware, HeaderMiddleware, LoggerMiddleware, Middleware, RecoveryMiddleware,
    SessionMiddleware,
};
use crate::rest::RestController;
use crate::router::{Group, RouteTable, Router};
use crate::server::{HttpServer, ServerHandle};
use crate::session::{Provider, SessionConfig, SessionListener};

pub struct App {
    config: AppConfig,
    router: Router,
    routers: Vec<Router>,
    groups: Vec<Group>,
    middlewares: Vec<Box<dyn Middleware>>,
    session: Option<SessionMiddleware>,
    header: bool,
    logger: bool,
    recovery: Option<RecoveryMiddleware>,
    listeners: Arc<ListenerRegistry>,
    template_funcs: HashMap<String, minijinja::Value>,
    not_found: Option<Handler>,
}

impl Default for App {
    fn default() -> Self {
        Self::with_config(AppConfig::default())
    }
}

macro_rules! method_wrappers {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name<F>(&mut self, pattern: &str, handler: F) -> &mut Self
            where
                F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
            {
                self.router.$name(pattern, handler);
                self
            }
        )*
    };
}

impl App {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            routers: Vec::new(),
            groups: Vec::new(),
            middlewares: Vec::new(),
            session: None,
            header: true,
            logger: false,
            recovery: None,
            listeners: Arc::new(ListenerRegistry::new()),
            template_funcs: HashMap::new(),
            not_found: None,
        }
    }

    /// App configured from `BRRTWEB_CONFIG_FILE` and `BRRTWEB_*` overrides.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when the named config file cannot be loaded.
    pub fn from_env() -> Result<Self, ConfigError> {
        AppConfig::from_env().map(Self::with_config)
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    // --- routes -----------------------------------------------------------

    /// Register on the app's default router.
    ///
    /// # Panics
    ///
    /// Panics on an unsupported method, like [`Router::route`].
    pub fn route<F>(&mut self, method: &str, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.router.route(method, pattern, handler);
        self
    }

    method_wrappers!(get, post, put, delete, patch, head, options, any);

    /// Serve a file for `GET pattern`.
    pub fn resource(&mut self, pattern: &str, file: &str, content_type: &str) -> &mut Self {
        self.router.resource(pattern, file, content_type);
        self
    }

    /// Serve a named asset for `GET pattern`.
    pub fn asset(
        &mut self,
        source: Arc<dyn AssetSource>,
        pattern: &str,
        name: &str,
        content_type: &str,
    ) -> &mut Self {
        self.router.asset(source, pattern, name, content_type);
        self
    }

    pub fn add_router(&mut self, router: Router) -> &mut Self {
        self.routers.push(router);
        self
    }

    pub fn add_group(&mut self, group: Group) -> &mut Self {
        self.groups.push(group);
        self
    }

    pub fn controller(&mut self, controller: &dyn RestController) -> &mut Self {
        self.router.controller(controller);
        self
    }

    /// Answer unmatched requests with `handler` instead of the plain 404.
    pub fn not_found<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.not_found = Some(Arc::new(handler));
        self
    }

    // --- middlewares ------------------------------------------------------

    /// Append a user middleware; user middlewares run after the built-ins,
    /// in the order added.
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middlewares.push(Box::new(middleware));
        self
    }

    pub fn use_cors(&mut self, cors: CorsMiddleware) -> &mut Self {
        self.use_middleware(cors)
    }

    pub fn use_logger(&mut self) -> &mut Self {
        self.logger = true;
        self
    }

    pub fn use_recovery(&mut self) -> &mut Self {
        if self.recovery.is_none() {
            self.recovery = Some(RecoveryMiddleware::default());
        }
        self
    }

    /// Enable recovery with custom reply field names and code.
    pub fn recovery_config(&mut self, code_name: &str, code: i64, msg_name: &str) -> &mut Self {
        self.recovery = Some(RecoveryMiddleware::with_config(code_name, code, msg_name));
        self
    }

    /// Enable recovery with a custom handler receiving the failure message.
    pub fn recovery_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context, &str) -> HandlerResult + Send + Sync + 'static,
    {
        let recovery = self.recovery.take().unwrap_or_default();
        self.recovery = Some(recovery.handler_fn(handler));
        self
    }

    /// Enable sessions; starts the provider's cleanup loop.
    pub fn use_session(
        &mut self,
        provider: Arc<dyn Provider>,
        config: SessionConfig,
        listener: SessionListener,
    ) -> &mut Self {
        self.session = Some(SessionMiddleware::new(provider, config, listener));
        self
    }

    /// Toggle the `Server` header middleware.
    pub fn header(&mut self, enabled: bool) -> &mut Self {
        self.header = enabled;
        self
    }

    pub fn add_listener(&mut self, listener: Listener) -> &mut Self {
        self.listeners.add(listener);
        self
    }

    /// Make a helper function available to every template.
    pub fn template_func(&mut self, name: &str, func: minijinja::Value) -> &mut Self {
        if !name.is_empty() {
            self.template_funcs.insert(name.to_string(), func);
        }
        self
    }

    // --- assembly ---------------------------------------------------------

    /// Merge every route and assemble the middleware chain.
    #[must_use]
    pub fn build(&self) -> Dispatcher {
        let mut routers = Vec::with_capacity(self.routers.len() + 1);
        routers.push(self.router.clone());
        routers.extend(self.routers.iter().cloned());
        let table = RouteTable::build(&routers, &self.groups);

        let templates =
            Templates::new(self.config.template.clone()).with_funcs(self.template_funcs.clone());
        let pool = ContextPool::new(Arc::clone(&self.listeners), self.config.pool.max_idle);
        let mut dispatcher = Dispatcher::new(table)
            .with_pool(pool)
            .with_templates(templates);

        if let Some(session) = &self.session {
            dispatcher.add_middleware(session);
        }
        if self.header {
            dispatcher.add_middleware(&HeaderMiddleware::default());
        }
        if self.logger {
            dispatcher.add_middleware(&LoggerMiddleware);
        }
        if let Some(recovery) = &self.recovery {
            dispatcher.add_middleware(recovery);
        }
        for middleware in &self.middlewares {
            dispatcher.add_middleware(middleware.as_ref());
        }
        if let Some(handler) = &self.not_found {
            dispatcher.set_not_found(Arc::clone(handler));
        }
        info!(
            routes = dispatcher.table().len(),
            middlewares = ?dispatcher.middleware_names(),
            "Application assembled"
        );
        dispatcher
    }

    /// Build and serve on `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub fn start<A: ToSocketAddrs>(&self, addr: A) -> io::Result<ServerHandle> {
        HttpServer::new(Arc::new(self.build()), self.config.server.clone()).start(addr)
    }

    /// Serve on the configured `host:port` until the server stops.
    ///
    /// # Errors
    ///
    /// Bind failure, or the accept loop panicked.
    pub fn run(&self) -> io::Result<()> {
        let handle = self.start(self.config.server.address())?;
        info!(addr = %handle.local_addr(), "Server started");
        handle
            .join()
            .map_err(|_| io::Error::other("server accept loop panicked"))
    }
}
