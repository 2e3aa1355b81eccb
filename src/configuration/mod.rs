//! Logic for loading configuration in to an object model

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use displaydoc::Display;
use envmnt::ExpandOptions;
use envmnt::ExpansionType;
use schemars::gen::SchemaSettings;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::cors::{self};

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not read configuration file: {0}
    ReadFile(std::io::Error),
    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
    /// could not deserialize configuration: {0}
    DeserializeConfigError(serde_json::Error),
    /// could not configure the {layer} layer: {error}
    LayerConfiguration { layer: &'static str, error: String },
}

/// The configuration for the gateway.
///
/// Can be created through `serde::Deserialize` from YAML,
/// or inline in Rust code with the builder.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, Default)]
pub struct Configuration {
    /// Configuration options pertaining to the http server component.
    #[serde(default)]
    pub(crate) server: Server,

    /// Configuration options pertaining to the document store.
    #[serde(default)]
    pub(crate) store: Store,

    /// Cross origin request headers.
    #[serde(default)]
    pub(crate) cors: Cors,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from_str("127.0.0.1:4000").expect("default listen address must parse")
}

#[buildstructor::buildstructor]
impl Configuration {
    #[builder]
    pub(crate) fn new(server: Option<Server>, store: Option<Store>, cors: Option<Cors>) -> Self {
        Self {
            server: server.unwrap_or_default(),
            store: store.unwrap_or_default(),
            cors: cors.unwrap_or_default(),
        }
    }

    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }
}

/// Parse configuration from a string in YAML syntax
impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_configuration(s)
    }
}

/// Configuration options pertaining to the http server component.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct Server {
    /// The socket address and port to listen on
    /// Defaults to 127.0.0.1:4000
    #[serde(default = "default_listen")]
    pub(crate) listen: SocketAddr,

    /// introspection queries
    /// enabled by default
    #[serde(default = "default_introspection")]
    pub(crate) introspection: bool,

    /// display the GraphiQL landing page on GET
    /// enabled by default
    #[serde(default = "default_landing_page")]
    pub(crate) landing_page: bool,

    /// The HTTP path on which GraphQL requests will be served.
    /// default: "/"
    #[serde(default = "default_endpoint")]
    pub(crate) endpoint: String,

    /// health check path
    /// default: "/health"
    #[serde(default = "default_health_check_path")]
    pub(crate) health_check_path: String,
}

#[buildstructor::buildstructor]
impl Server {
    #[builder]
    pub(crate) fn new(
        listen: Option<SocketAddr>,
        introspection: Option<bool>,
        landing_page: Option<bool>,
        endpoint: Option<String>,
        health_check_path: Option<String>,
    ) -> Self {
        Self {
            listen: listen.unwrap_or_else(default_listen),
            introspection: introspection.unwrap_or_else(default_introspection),
            landing_page: landing_page.unwrap_or_else(default_landing_page),
            endpoint: endpoint.unwrap_or_else(default_endpoint),
            health_check_path: health_check_path.unwrap_or_else(default_health_check_path),
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Server::builder().build()
    }
}

/// Configuration options pertaining to the document store.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct Store {
    /// The store connection string.
    /// Usually provided on the command line or via BISTRO_STORE_URL instead.
    #[serde(default)]
    pub(crate) url: Option<String>,

    /// The database holding the user, dish and review collections.
    /// A database named in the connection string takes precedence.
    /// default: "bistro"
    #[serde(default = "default_database")]
    pub(crate) database: String,

    /// Timeout for establishing the store connection at startup.
    /// default: 10s
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    #[schemars(with = "String")]
    pub(crate) connect_timeout: Duration,
}

#[buildstructor::buildstructor]
impl Store {
    #[builder]
    pub(crate) fn new(
        url: Option<String>,
        database: Option<String>,
        connect_timeout: Option<Duration>,
    ) -> Self {
        Self {
            url,
            database: database.unwrap_or_else(default_database),
            connect_timeout: connect_timeout.unwrap_or_else(default_connect_timeout),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::builder().build()
    }
}

/// Cross origin request configuration.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct Cors {
    /// Set to true to allow any origin.
    ///
    /// Defaults to false
    /// Having this set to true is the only way to allow Origin: null.
    #[serde(default)]
    pub(crate) allow_any_origin: bool,

    /// Set to true to add the `Access-Control-Allow-Credentials` header.
    #[serde(default)]
    pub(crate) allow_credentials: bool,

    /// The headers to allow.
    ///
    /// If this value is not set, the gateway will mirror client's
    /// `Access-Control-Request-Headers`.
    #[serde(default)]
    pub(crate) allow_headers: Vec<String>,

    /// Which response headers should be made available to scripts running in
    /// the browser, in response to a cross-origin request.
    #[serde(default)]
    pub(crate) expose_headers: Option<Vec<String>>,

    /// The origin(s) to allow requests from.
    /// Defaults to an empty list.
    #[serde(default)]
    pub(crate) origins: Vec<String>,

    /// Allowed request methods. Defaults to GET, POST, OPTIONS.
    #[serde(default = "default_cors_methods")]
    pub(crate) methods: Vec<String>,
}

impl Default for Cors {
    fn default() -> Self {
        Self {
            methods: default_cors_methods(),
            allow_any_origin: Default::default(),
            allow_credentials: Default::default(),
            allow_headers: Default::default(),
            expose_headers: Default::default(),
            origins: Default::default(),
        }
    }
}

fn default_cors_methods() -> Vec<String> {
    vec!["GET".into(), "POST".into(), "OPTIONS".into()]
}

fn default_introspection() -> bool {
    true
}

fn default_landing_page() -> bool {
    true
}

fn default_endpoint() -> String {
    String::from("/")
}

fn default_health_check_path() -> String {
    String::from("/health")
}

fn default_database() -> String {
    String::from("bistro")
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Cors {
    pub(crate) fn into_layer(self) -> Result<CorsLayer, String> {
        // Ensure configuration is valid before creating CorsLayer

        self.ensure_usable_cors_rules()?;

        let allow_headers = if self.allow_headers.is_empty() {
            cors::AllowHeaders::mirror_request()
        } else {
            cors::AllowHeaders::list(self.allow_headers.iter().filter_map(|header| {
                header
                    .parse()
                    .map_err(|_| tracing::error!("header name '{header}' is not valid"))
                    .ok()
            }))
        };
        let cors = CorsLayer::new()
            .vary([])
            .allow_credentials(self.allow_credentials)
            .allow_headers(allow_headers)
            .expose_headers(cors::ExposeHeaders::list(
                self.expose_headers
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|header| {
                        header
                            .parse()
                            .map_err(|_| tracing::error!("header name '{header}' is not valid"))
                            .ok()
                    }),
            ))
            .allow_methods(cors::AllowMethods::list(self.methods.iter().filter_map(
                |method| {
                    method
                        .parse()
                        .map_err(|_| tracing::error!("method '{method}' is not valid"))
                        .ok()
                },
            )));

        if self.allow_any_origin {
            Ok(cors.allow_origin(cors::Any))
        } else {
            Ok(cors.allow_origin(cors::AllowOrigin::list(
                self.origins.into_iter().filter_map(|origin| {
                    origin
                        .parse()
                        .map_err(|_| tracing::error!("origin '{origin}' is not valid"))
                        .ok()
                }),
            )))
        }
    }

    // This is cribbed from the similarly named function in tower-http. The version there
    // asserts that CORS rules are useable, which results in a panic if they aren't. We
    // don't want the gateway to panic in such cases, so this function returns an error
    // with a message describing what the problem is.
    fn ensure_usable_cors_rules(&self) -> Result<(), &'static str> {
        if self.allow_credentials {
            if self.allow_headers.iter().any(|x| x == "*") {
                return Err("Invalid CORS configuration: Cannot combine `Access-Control-Allow-Credentials: true` \
                        with `Access-Control-Allow-Headers: *`");
            }

            if self.methods.iter().any(|x| x == "*") {
                return Err("Invalid CORS configuration: Cannot combine `Access-Control-Allow-Credentials: true` \
                    with `Access-Control-Allow-Methods: *`");
            }

            if self.origins.iter().any(|x| x == "*") || self.allow_any_origin {
                return Err("Invalid CORS configuration: Cannot combine `Access-Control-Allow-Credentials: true` \
                    with `Access-Control-Allow-Origin: *`");
            }

            if let Some(headers) = &self.expose_headers {
                if headers.iter().any(|x| x == "*") {
                    return Err("Invalid CORS configuration: Cannot combine `Access-Control-Allow-Credentials: true` \
                        with `Access-Control-Expose-Headers: *`");
                }
            }
        }
        Ok(())
    }
}

/// Generate a JSON schema for the configuration.
pub(crate) fn generate_config_schema() -> RootSchema {
    let settings = SchemaSettings::draft07().with(|s| {
        s.option_nullable = true;
        s.option_add_null_type = false;
        s.inline_subschemas = true;
    });
    let gen = settings.into_generator();
    gen.into_root_schema_for::<Configuration>()
}

/// Validate config yaml.
///
/// The yaml is parsed into a json value, `${ENV}` references in string values
/// are expanded, and the result is deserialized with serde doing the
/// validation.
pub(crate) fn validate_configuration(raw_yaml: &str) -> Result<Configuration, ConfigurationError> {
    let yaml: Value = serde_yaml::from_str(raw_yaml).map_err(|e| {
        ConfigurationError::InvalidConfiguration {
            message: "failed to parse yaml",
            error: e.to_string(),
        }
    })?;
    let expanded_yaml = expand_env_variables(&yaml);
    serde_json::from_value(expanded_yaml).map_err(ConfigurationError::DeserializeConfigError)
}

fn expand_env_variables(configuration: &Value) -> Value {
    let mut configuration = configuration.clone();
    visit(&mut configuration);
    configuration
}

fn visit(value: &mut Value) {
    let mut expanded: Option<String> = None;
    match value {
        Value::String(value) => {
            let new_value = envmnt::expand(
                value,
                Some(
                    ExpandOptions::new()
                        .clone_with_expansion_type(ExpansionType::UnixBracketsWithDefaults),
                ),
            );

            if &new_value != value {
                expanded = Some(new_value);
            }
        }
        Value::Array(a) => a.iter_mut().for_each(visit),
        Value::Object(o) => o.iter_mut().for_each(|(_, v)| visit(v)),
        _ => {}
    }
    // The expansion may have resulted in a primitive, reparse and replace
    if let Some(expanded) = expanded {
        *value = coerce(&expanded)
    }
}

fn coerce(expanded: &str) -> Value {
    match serde_yaml::from_str(expanded) {
        Ok(Value::Bool(b)) => Value::Bool(b),
        Ok(Value::Number(n)) => Value::Number(n),
        Ok(Value::Null) => Value::Null,
        _ => Value::String(expanded.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Configuration::builder().build();
        assert_eq!(config.server.listen, default_listen());
        assert!(config.server.introspection);
        assert!(config.server.landing_page);
        assert_eq!(config.server.endpoint, "/");
        assert_eq!(config.server.health_check_path, "/health");
        assert_eq!(config.store.database, "bistro");
        assert_eq!(config.store.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn parse_from_yaml() {
        let config = Configuration::from_str(
            r#"
server:
  listen: 0.0.0.0:9000
  introspection: false
store:
  url: mongodb://localhost:27017/menu
  connect_timeout: 3s
"#,
        )
        .unwrap();
        assert_eq!(
            config.server.listen,
            SocketAddr::from_str("0.0.0.0:9000").unwrap()
        );
        assert!(!config.server.introspection);
        assert_eq!(
            config.store.url.as_deref(),
            Some("mongodb://localhost:27017/menu")
        );
        assert_eq!(config.store.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = Configuration::from_str(
            r#"
server:
  pagination: true
"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("pagination"));
    }

    #[test]
    fn expansion_from_env() {
        envmnt::set("TEST_BISTRO_STORE_URL", "mongodb://expanded:27017");
        let config = Configuration::from_str(
            r#"
store:
  url: ${TEST_BISTRO_STORE_URL}
"#,
        )
        .unwrap();
        assert_eq!(config.store.url.as_deref(), Some("mongodb://expanded:27017"));
        envmnt::remove("TEST_BISTRO_STORE_URL");
    }

    #[test]
    fn cors_rejects_credentials_with_any_origin() {
        let cors = Cors {
            allow_credentials: true,
            allow_any_origin: true,
            ..Default::default()
        };
        assert!(cors.into_layer().is_err());
    }

    #[test]
    fn config_schema_is_generated() {
        let schema = serde_json::to_value(generate_config_schema()).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("server"));
        assert!(properties.contains_key("store"));
        assert!(properties.contains_key("cors"));
    }
}
