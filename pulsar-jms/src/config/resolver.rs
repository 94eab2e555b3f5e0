/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Extraction of typed settings from the flat property bag.

use crate::error::{Error, Result};
use crate::observability::events;
use serde_json::{Map, Value};
use std::fmt::{Debug, Formatter};
use std::time::Duration;
use tracing::debug;

const COMPONENT: &str = "config_resolver";

pub type Properties = Map<String, Value>;

pub const WEB_SERVICE_URL: &str = "webServiceUrl";
pub const BROKER_SERVICE_URL: &str = "brokerServiceUrl";
pub const SYSTEM_NAMESPACE: &str = "jms.systemNamespace";
pub const CLIENT_ID: &str = "jms.clientId";
pub const QUEUE_NAME: &str = "jms.queueName";
pub const WAIT_FOR_SERVER_STARTUP_TIMEOUT: &str = "jms.waitForServerStartupTimeout";
pub const ENABLE_CLIENT_SIDE_FEATURES: &str = "jms.enableClientSideFeatures";
pub const USE_EXCLUSIVE_SUBSCRIPTIONS_FOR_SIMPLE_CONSUMERS: &str =
    "jms.useExclusiveSubscriptionsForSimpleConsumers";
pub const FORCE_DELETE_TEMPORARY_DESTINATIONS: &str = "jms.forceDeleteTemporaryDestinations";
pub const TCK_USERNAME: &str = "jms.tckUsername";
pub const TCK_PASSWORD: &str = "jms.tckPassword";
pub const ENABLE_TRANSACTION: &str = "enableTransaction";
pub const AUTH_PLUGIN: &str = "authPlugin";
pub const AUTH_PARAMS: &str = "authParams";
pub const TLS_ALLOW_INSECURE_CONNECTION: &str = "tlsAllowInsecureConnection";
pub const TLS_ENABLE_HOSTNAME_VERIFICATION: &str = "tlsEnableHostnameVerification";
pub const TLS_TRUST_CERTS_FILE_PATH: &str = "tlsTrustCertsFilePath";
pub const USE_KEY_STORE_TLS: &str = "useKeyStoreTls";
pub const TLS_TRUST_STORE_TYPE: &str = "tlsTrustStoreType";
pub const TLS_TRUST_STORE_PATH: &str = "tlsTrustStorePath";
pub const TLS_TRUST_STORE_PASSWORD: &str = "tlsTrustStorePassword";
pub const PRODUCER_CONFIG: &str = "producerConfig";
pub const CONSUMER_CONFIG: &str = "consumerConfig";

pub const DEFAULT_WEB_SERVICE_URL: &str = "http://localhost:8080";
pub const DEFAULT_SYSTEM_NAMESPACE: &str = "public/default";
pub const DEFAULT_QUEUE_SUBSCRIPTION_NAME: &str = "jms-queue";
pub const DEFAULT_WAIT_FOR_SERVER_STARTUP_TIMEOUT_MS: u64 = 60_000;

/// Authentication plugin handed verbatim to both client builders.
#[derive(Clone, Default, PartialEq)]
pub struct Authentication {
    pub plugin: String,
    pub params: String,
}

impl Authentication {
    pub fn is_configured(&self) -> bool {
        !self.plugin.is_empty()
    }
}

impl Debug for Authentication {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authentication")
            .field("plugin", &self.plugin)
            .field("params", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq)]
pub struct TlsSettings {
    pub allow_insecure_connection: bool,
    pub enable_hostname_verification: bool,
    pub trust_certs_file_path: String,
    pub use_key_store_tls: bool,
    pub trust_store_type: String,
    pub trust_store_path: String,
    pub trust_store_password: String,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            allow_insecure_connection: false,
            enable_hostname_verification: false,
            trust_certs_file_path: String::new(),
            use_key_store_tls: false,
            trust_store_type: "JKS".to_string(),
            trust_store_path: String::new(),
            trust_store_password: String::new(),
        }
    }
}

impl Debug for TlsSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsSettings")
            .field("allow_insecure_connection", &self.allow_insecure_connection)
            .field(
                "enable_hostname_verification",
                &self.enable_hostname_verification,
            )
            .field("trust_certs_file_path", &self.trust_certs_file_path)
            .field("use_key_store_tls", &self.use_key_store_tls)
            .field("trust_store_type", &self.trust_store_type)
            .field("trust_store_path", &self.trust_store_path)
            .finish_non_exhaustive()
    }
}

/// Settings for the administrative client.
#[derive(Clone, Debug, PartialEq)]
pub struct AdminSettings {
    pub service_http_url: String,
    pub tls: TlsSettings,
    pub authentication: Authentication,
}

/// Settings for the data-plane client. `properties` is the residual bag, forwarded
/// unmodified.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientSettings {
    pub service_url: String,
    pub tls: TlsSettings,
    pub authentication: Authentication,
    pub enable_transaction: bool,
    pub properties: Properties,
}

/// Typed view of the configuration after initialization consumed it.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedConfig {
    pub system_namespace: String,
    pub default_client_id: Option<String>,
    pub queue_subscription_name: String,
    pub wait_for_server_startup_timeout: Duration,
    pub enable_client_side_features: bool,
    pub use_exclusive_subscriptions_for_simple_consumers: bool,
    pub force_delete_temporary_destinations: bool,
    pub enable_transaction: bool,
    pub tck_username: String,
    pub tck_password: String,
    pub producer_overrides: Properties,
    pub consumer_overrides: Properties,
    pub admin: AdminSettings,
    pub client: ClientSettings,
}

impl ResolvedConfig {
    /// Removes every recognized key from `properties` and returns the typed settings.
    ///
    /// Keys that are not recognized stay in `properties` and end up in
    /// [`ClientSettings::properties`]. Resolving an already resolved bag yields the
    /// defaults, since the consumed keys are gone.
    pub fn resolve(properties: &mut Properties) -> Result<Self> {
        let producer_overrides = take_map(properties, PRODUCER_CONFIG)?;
        let consumer_overrides = take_map(properties, CONSUMER_CONFIG)?;

        let system_namespace = take_string(properties, SYSTEM_NAMESPACE)
            .unwrap_or_else(|| DEFAULT_SYSTEM_NAMESPACE.to_string());
        let tck_username = take_string(properties, TCK_USERNAME).unwrap_or_default();
        let tck_password = take_string(properties, TCK_PASSWORD).unwrap_or_default();
        let default_client_id = take_string(properties, CLIENT_ID);
        let queue_subscription_name = take_string(properties, QUEUE_NAME)
            .unwrap_or_else(|| DEFAULT_QUEUE_SUBSCRIPTION_NAME.to_string());
        let wait_for_server_startup_timeout = Duration::from_millis(
            take_u64(properties, WAIT_FOR_SERVER_STARTUP_TIMEOUT)?
                .unwrap_or(DEFAULT_WAIT_FOR_SERVER_STARTUP_TIMEOUT_MS),
        );
        let enable_client_side_features =
            take_bool(properties, ENABLE_CLIENT_SIDE_FEATURES).unwrap_or(false);
        // Exclusive subscriptions cannot deliver delayed messages, hence the switch.
        let use_exclusive_subscriptions_for_simple_consumers =
            take_bool(properties, USE_EXCLUSIVE_SUBSCRIPTIONS_FOR_SIMPLE_CONSUMERS)
                .unwrap_or(true);
        let force_delete_temporary_destinations =
            take_bool(properties, FORCE_DELETE_TEMPORARY_DESTINATIONS).unwrap_or(false);
        // Left in place: the data-plane client reads it too.
        let enable_transaction = properties
            .get(ENABLE_TRANSACTION)
            .map(parse_bool)
            .unwrap_or(false);

        let web_service_url = take_string(properties, WEB_SERVICE_URL)
            .unwrap_or_else(|| DEFAULT_WEB_SERVICE_URL.to_string());
        let broker_service_url = take_string(properties, BROKER_SERVICE_URL).unwrap_or_default();

        let authentication = Authentication {
            plugin: take_string(properties, AUTH_PLUGIN).unwrap_or_default(),
            params: take_string(properties, AUTH_PARAMS).unwrap_or_default(),
        };
        let tls = take_tls_settings(properties);

        let admin = AdminSettings {
            service_http_url: web_service_url.clone(),
            tls: tls.clone(),
            authentication: authentication.clone(),
        };

        let service_url = if broker_service_url.is_empty() {
            web_service_url
        } else {
            broker_service_url
        };
        let client = ClientSettings {
            service_url,
            tls,
            authentication,
            enable_transaction,
            properties: properties.clone(),
        };

        debug!(
            event = events::CONFIG_RESOLVED,
            component = COMPONENT,
            system_namespace = %system_namespace,
            queue_subscription = %queue_subscription_name,
            residual_keys = client.properties.len(),
            "resolved connection factory configuration"
        );

        Ok(Self {
            system_namespace,
            default_client_id,
            queue_subscription_name,
            wait_for_server_startup_timeout,
            enable_client_side_features,
            use_exclusive_subscriptions_for_simple_consumers,
            force_delete_temporary_destinations,
            enable_transaction,
            tck_username,
            tck_password,
            producer_overrides,
            consumer_overrides,
            admin,
            client,
        })
    }
}

fn take_tls_settings(properties: &mut Properties) -> TlsSettings {
    let defaults = TlsSettings::default();
    TlsSettings {
        allow_insecure_connection: take_bool(properties, TLS_ALLOW_INSECURE_CONNECTION)
            .unwrap_or(defaults.allow_insecure_connection),
        enable_hostname_verification: take_bool(properties, TLS_ENABLE_HOSTNAME_VERIFICATION)
            .unwrap_or(defaults.enable_hostname_verification),
        trust_certs_file_path: take_string(properties, TLS_TRUST_CERTS_FILE_PATH)
            .unwrap_or(defaults.trust_certs_file_path),
        use_key_store_tls: take_bool(properties, USE_KEY_STORE_TLS)
            .unwrap_or(defaults.use_key_store_tls),
        trust_store_type: take_string(properties, TLS_TRUST_STORE_TYPE)
            .unwrap_or(defaults.trust_store_type),
        trust_store_path: take_string(properties, TLS_TRUST_STORE_PATH)
            .unwrap_or(defaults.trust_store_path),
        trust_store_password: take_string(properties, TLS_TRUST_STORE_PASSWORD)
            .unwrap_or(defaults.trust_store_password),
    }
}

pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn parse_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

pub(crate) fn parse_u64(key: &str, value: &Value) -> Result<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| Error::config(key, format!("expected a non-negative integer, got {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|err| Error::config(key, format!("cannot parse '{s}': {err}"))),
        other => Err(Error::config(key, format!("expected a number, got {other}"))),
    }
}

fn take_string(properties: &mut Properties, key: &str) -> Option<String> {
    properties.remove(key).as_ref().and_then(value_to_string)
}

fn take_bool(properties: &mut Properties, key: &str) -> Option<bool> {
    match properties.remove(key) {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_bool(&value)),
    }
}

fn take_u64(properties: &mut Properties, key: &str) -> Result<Option<u64>> {
    match properties.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_u64(key, &value).map(Some),
    }
}

fn take_map(properties: &mut Properties, key: &str) -> Result<Properties> {
    match properties.remove(key) {
        None | Some(Value::Null) => Ok(Properties::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(Error::config(key, format!("expected an object, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn properties(value: Value) -> Properties {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn empty_bag_resolves_to_defaults() {
        let mut bag = Properties::new();
        let resolved = ResolvedConfig::resolve(&mut bag).expect("defaults resolve");

        assert_eq!(resolved.system_namespace, "public/default");
        assert_eq!(resolved.queue_subscription_name, "jms-queue");
        assert_eq!(
            resolved.wait_for_server_startup_timeout,
            Duration::from_millis(60_000)
        );
        assert!(resolved.use_exclusive_subscriptions_for_simple_consumers);
        assert!(!resolved.enable_transaction);
        assert_eq!(resolved.default_client_id, None);
        assert_eq!(resolved.admin.service_http_url, "http://localhost:8080");
        assert_eq!(resolved.client.service_url, "http://localhost:8080");
        assert_eq!(resolved.admin.tls.trust_store_type, "JKS");
    }

    #[test]
    fn recognized_keys_are_consumed_and_residual_is_forwarded() {
        let mut bag = properties(json!({
            "webServiceUrl": "http://admin:8080",
            "brokerServiceUrl": "pulsar://broker:6650",
            "jms.queueName": "orders-sub",
            "jms.clientId": "client-1",
            "jms.waitForServerStartupTimeout": 1500,
            "jms.enableClientSideFeatures": "TRUE",
            "jms.useExclusiveSubscriptionsForSimpleConsumers": false,
            "enableTransaction": "true",
            "tlsAllowInsecureConnection": "true",
            "authPlugin": "org.example.Token",
            "authParams": "token:secret",
            "operationTimeoutMs": 3000,
            "producerConfig": {"batchingEnabled": false},
            "consumerConfig": {"receiverQueueSize": 10}
        }));

        let resolved = ResolvedConfig::resolve(&mut bag).expect("valid config");

        assert_eq!(resolved.queue_subscription_name, "orders-sub");
        assert_eq!(resolved.default_client_id.as_deref(), Some("client-1"));
        assert_eq!(
            resolved.wait_for_server_startup_timeout,
            Duration::from_millis(1500)
        );
        assert!(resolved.enable_client_side_features);
        assert!(!resolved.use_exclusive_subscriptions_for_simple_consumers);
        assert!(resolved.enable_transaction);
        assert_eq!(resolved.client.service_url, "pulsar://broker:6650");
        assert_eq!(resolved.admin.service_http_url, "http://admin:8080");
        assert!(resolved.admin.tls.allow_insecure_connection);
        assert_eq!(resolved.admin.tls, resolved.client.tls);
        assert!(resolved.client.authentication.is_configured());
        assert_eq!(resolved.producer_overrides["batchingEnabled"], json!(false));
        assert_eq!(resolved.consumer_overrides["receiverQueueSize"], json!(10));

        let mut residual_keys: Vec<&String> = bag.keys().collect();
        residual_keys.sort();
        assert_eq!(residual_keys, vec!["enableTransaction", "operationTimeoutMs"]);
        assert_eq!(resolved.client.properties, bag);
    }

    #[test]
    fn resolving_twice_is_a_no_op_on_the_bag() {
        let mut bag = properties(json!({"jms.queueName": "q", "custom": 1}));
        ResolvedConfig::resolve(&mut bag).expect("first resolve");
        let after_first = bag.clone();

        let second = ResolvedConfig::resolve(&mut bag).expect("second resolve");
        assert_eq!(bag, after_first);
        assert_eq!(second.queue_subscription_name, "jms-queue");
    }

    #[test]
    fn unparseable_timeout_is_a_config_error() {
        let mut bag = properties(json!({"jms.waitForServerStartupTimeout": "soon"}));
        let err = ResolvedConfig::resolve(&mut bag).expect_err("must fail");
        assert!(matches!(
            err,
            Error::Config { ref key, .. } if key == WAIT_FOR_SERVER_STARTUP_TIMEOUT
        ));
    }

    #[test]
    fn non_object_override_map_is_a_config_error() {
        let mut bag = properties(json!({"consumerConfig": "receiverQueueSize=1"}));
        assert!(matches!(
            ResolvedConfig::resolve(&mut bag),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn secrets_are_not_rendered_in_debug_output() {
        let mut bag = properties(json!({
            "authParams": "token:secret",
            "tlsTrustStorePassword": "hunter2"
        }));
        let resolved = ResolvedConfig::resolve(&mut bag).expect("valid config");
        let rendered = format!("{:?}", resolved.admin);
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("hunter2"));
    }
}
