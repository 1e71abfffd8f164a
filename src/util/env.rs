//! Environment configuration, deserialized straight out of `dotenvy::vars()`.
//!
//! The deserializer follows the [`envy`] crate's approach but lets `rename`-style serde
//! attributes and field defaults work on the target struct.
//!
//! [`envy`]: https://github.com/softprops/envy

use std::iter::{IntoIterator, empty};
use std::sync::LazyLock;

use serde::Deserialize;
use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{self, IntoDeserializer};
use thiserror::Error;
use tokio::sync::OnceCell;

pub const MIN_JWT_SECRET_LEN: usize = 32;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);
pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = ENV_VARS.get_or_try_init(|| async { Env::new() }).await?;
    Ok(match var {
        Var::DatabaseUrl => &vars.database_url,
        Var::JwtSecret => &vars.jwt_secret,
        Var::JwtAccessTtlSecs => &vars.jwt_access_ttl_secs,
        Var::ServerApiPort => &vars.server_api_port,
        Var::CorsAllowOrigins => &vars.cors_allow_origins,
        Var::OtelExporterEndpoint => &vars.otel_exporter_otlp_endpoint,
        Var::ApiServiceName => &vars.api_service_name,
        Var::ApiTracerName => &vars.api_tracer_name,
        Var::LogFilter => &vars.rust_log,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Env {
    pub database_url: String,
    pub jwt_secret: String,
    #[serde(default = "default_access_ttl")]
    pub jwt_access_ttl_secs: String,
    #[serde(default = "default_port")]
    pub server_api_port: String,
    #[serde(default = "default_cors")]
    pub cors_allow_origins: String,
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: String,
    #[serde(default = "default_service_name")]
    pub api_service_name: String,
    #[serde(default = "default_tracer_name")]
    pub api_tracer_name: String,
    #[serde(default = "default_log_filter")]
    pub rust_log: String,
}

fn default_access_ttl() -> String {
    String::from("3600")
}

fn default_port() -> String {
    String::from("8000")
}

fn default_cors() -> String {
    String::from("*")
}

fn default_service_name() -> String {
    String::from("compass-api")
}

fn default_tracer_name() -> String {
    String::from("compass-tracer")
}

fn default_log_filter() -> String {
    String::from("compass_server=debug,tower_http=debug,axum=debug,sqlx=info,info")
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        Self::validated(from_env::<Env>()?)
    }

    fn validated(env: Env) -> EnvResult<Self> {
        if env.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(EnvErr::Invalid {
                var: "JWT_SECRET",
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} characters"),
            });
        }

        if env.server_api_port.parse::<u16>().is_err() {
            return Err(EnvErr::Invalid {
                var: "SERVER_API_PORT",
                reason: format!("'{}' is not a port number", env.server_api_port),
            });
        }

        if env.jwt_access_ttl_secs.parse::<u64>().is_err() {
            return Err(EnvErr::Invalid {
                var: "JWT_ACCESS_TTL_SECS",
                reason: format!("'{}' is not a number of seconds", env.jwt_access_ttl_secs),
            });
        }

        Ok(env)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Var {
    DatabaseUrl,
    JwtSecret,
    JwtAccessTtlSecs,
    ServerApiPort,
    CorsAllowOrigins,
    OtelExporterEndpoint,
    ApiServiceName,
    ApiTracerName,
    LogFilter,
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

// ---
//  Deserializer implementation
// ---

struct Val(String, String);
struct Varname(String);

struct Deserializer<'de, Iter: Iterator<Item = (String, String)>> {
    inner: MapDeserializer<'de, Vars<Iter>, EnvDeserializeError>,
}

struct Vars<Iter>
where
    Iter: IntoIterator<Item = (String, String)>,
{
    inner: Iter,
}

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for Val {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for Varname {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

impl<Iter: Iterator<Item = (String, String)>> Iterator for Vars<Iter> {
    type Item = (Varname, Val);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(k, v)| (Varname(k.clone()), Val(k, v)))
    }
}

macro_rules! forward_parsed_vals {
    ($($ty:ident => $method:ident,)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value, EnvDeserializeError>
            where
                V: de::Visitor<'de>
            {
                match self.1.parse::<$ty>() {
                    Ok(val) => val.into_deserializer().$method(visitor),
                    Err(e) => Err(serde::de::Error::custom(format_args!(
                        "{}: while parsing '{}' (provider: {})",
                        e, self.1, self.0
                    )))
                }
            }
        )*
    };
}

impl<'de> serde::de::Deserializer<'de> for Val {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.1.into_deserializer().deserialize_any(visitor)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        if self.1.is_empty() {
            SeqDeserializer::new(empty::<Val>()).deserialize_seq(visitor)
        } else {
            let values = self
                .1
                .split(',')
                .map(|v| Val(self.0.clone(), v.trim().to_owned()));
            SeqDeserializer::new(values).deserialize_seq(visitor)
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _: &'static str,
        _: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_enum(self.1.into_deserializer())
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    forward_parsed_vals! {
        bool => deserialize_bool,
        u8 => deserialize_u8,
        u16 => deserialize_u16,
        u32 => deserialize_u32,
        u64 => deserialize_u64,
        i8 => deserialize_i8,
        i16 => deserialize_i16,
        i32 => deserialize_i32,
        i64 => deserialize_i64,
        f32 => deserialize_f32,
        f64 => deserialize_f64,
    }

    serde::forward_to_deserialize_any! {
        char str string unit bytes byte_buf map
        unit_struct tuple_struct identifier tuple
        ignored_any
        struct
    }
}

impl<'de> serde::de::Deserializer<'de> for Varname {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.0.into_deserializer().deserialize_any(visitor)
    }

    #[inline]
    fn deserialize_newtype_struct<V>(
        self,
        _: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    serde::forward_to_deserialize_any! {
        char str string unit seq option bytes byte_buf map
        unit_struct tuple_struct identifier tuple ignored_any
        bool u8 u16 u32 u64 i8 i16 i32 i64 f32 f64 enum struct
    }
}

impl<'de, Iter: Iterator<Item = (String, String)>> Deserializer<'de, Iter> {
    fn new(vars: Iter) -> Self {
        Deserializer {
            inner: MapDeserializer::new(Vars { inner: vars }),
        }
    }
}

impl<'de, Iter: Iterator<Item = (String, String)>> serde::de::Deserializer<'de>
    for Deserializer<'de, Iter>
{
    type Error = EnvDeserializeError;
    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_map(self.inner)
    }

    serde::forward_to_deserialize_any! {
        char str string unit seq option bytes byte_buf
        newtype_struct unit_struct tuple_struct identifier
        tuple ignored_any bool u8 u16 u32 u64 i8 i16 i32 i64
        f32 f64 enum struct
    }
}

pub fn from_env<T>() -> Result<T, EnvDeserializeError>
where
    T: serde::de::DeserializeOwned,
{
    from_iter(dotenvy::vars())
}

pub fn from_iter<Iter, T>(iter: Iter) -> Result<T, EnvDeserializeError>
where
    T: serde::de::DeserializeOwned,
    Iter: IntoIterator<Item = (String, String)>,
{
    T::deserialize(Deserializer::new(iter.into_iter()))
}

impl serde::de::Error for EnvDeserializeError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        EnvDeserializeError::Custom(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        EnvDeserializeError::MissingValue(field.into())
    }
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error(transparent)]
    DeserializationError(#[from] EnvDeserializeError),

    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum EnvDeserializeError {
    #[error("env deserialization error: {0}")]
    Custom(String),

    #[error("missing environment variable {0}")]
    MissingValue(String),
}

#[cfg(test)]
mod test {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_defaults_fill_optional_vars() {
        let env: Env = from_iter(pairs(&[
            ("DATABASE_URL", "postgres://localhost/compass"),
            ("JWT_SECRET", SECRET),
            ("UNRELATED", "ignored"),
        ]))
        .unwrap();

        assert_eq!(env.server_api_port, "8000");
        assert_eq!(env.cors_allow_origins, "*");
        assert_eq!(env.jwt_access_ttl_secs, "3600");
        assert_eq!(env.otel_exporter_otlp_endpoint, "");
        assert_eq!(env.api_service_name, "compass-api");
        assert!(Env::validated(env).is_ok());
    }

    #[test]
    fn test_missing_required_var() {
        let err = from_iter::<_, Env>(pairs(&[("JWT_SECRET", SECRET)])).unwrap_err();
        assert!(matches!(err, EnvDeserializeError::MissingValue(ref v) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let env: Env = from_iter(pairs(&[
            ("DATABASE_URL", "postgres://localhost/compass"),
            ("JWT_SECRET", "too-short"),
        ]))
        .unwrap();

        assert!(matches!(
            Env::validated(env),
            Err(EnvErr::Invalid { var: "JWT_SECRET", .. })
        ));
    }

    #[test]
    fn test_bad_port_rejected() {
        let env: Env = from_iter(pairs(&[
            ("DATABASE_URL", "postgres://localhost/compass"),
            ("JWT_SECRET", SECRET),
            ("SERVER_API_PORT", "eighty"),
        ]))
        .unwrap();

        assert!(matches!(
            Env::validated(env),
            Err(EnvErr::Invalid { var: "SERVER_API_PORT", .. })
        ));
    }
}
