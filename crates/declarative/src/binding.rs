//! Binding resolution
//!
//! Maps an edge's (source kind, sink kind, intent) triple to the attributes
//! exported into the sink. The table is a single exhaustive `match`; pairs it
//! does not list resolve to [`Resolution::Unsupported`].

use crate::kind::{ResourceKind, SubResource};
use crate::types::Intent;
use serde::Serialize;
use std::fmt;

/// Which side of a binding supplies an exported value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Source,
    Sink,
    /// The link resource created by the binding step
    Link,
}

/// One exported attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Export {
    /// Attribute name in the binding key
    pub attribute: &'static str,
    pub from: Endpoint,
    /// Output attribute read from the endpoint
    pub output: &'static str,
}

impl Export {
    const fn source(attribute: &'static str, output: &'static str) -> Self {
        Self {
            attribute,
            from: Endpoint::Source,
            output,
        }
    }

    const fn sink(attribute: &'static str, output: &'static str) -> Self {
        Self {
            attribute,
            from: Endpoint::Sink,
            output,
        }
    }

    const fn link(attribute: &'static str, output: &'static str) -> Self {
        Self {
            attribute,
            from: Endpoint::Link,
            output,
        }
    }
}

/// What a resolved edge does at apply time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BindingRule {
    pub exports: &'static [Export],
    /// Backend resource the binding step creates before exporting
    pub link: Option<SubResource>,
}

/// Why an edge produces no binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Unresolved {
    /// The intent is recognized but has no table entries yet
    UnimplementedIntent { intent: Intent },
    /// One of the kinds cannot take part in this intent
    Incapable { intent: Intent },
    /// No entry for this kind pair
    Unsupported,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnimplementedIntent { intent } => write!(f, "intent '{intent}' is not implemented yet"),
            Self::Incapable { intent } => write!(f, "kinds cannot take part in intent '{intent}'"),
            Self::Unsupported => f.write_str("no binding exists for this kind pair"),
        }
    }
}

/// Result of looking up a triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(&'static BindingRule),
    Unresolved(Unresolved),
}

impl Resolution {
    pub const fn rule(self) -> Option<&'static BindingRule> {
        match self {
            Self::Resolved(rule) => Some(rule),
            Self::Unresolved(_) => None,
        }
    }
}

/// Deterministic output key for an exported attribute
pub fn binding_key(sink_id: &str, attribute: &str) -> String {
    format!("bind-{sink_id}-{attribute}")
}

/// Look up the binding for an edge triple
pub fn resolve(source: ResourceKind, sink: ResourceKind, intent: Intent) -> Resolution {
    if !source.descriptor().capabilities.can_source(intent) || !sink.descriptor().capabilities.can_sink(intent) {
        return Resolution::Unresolved(Unresolved::Incapable { intent });
    }
    if !intent.is_implemented() {
        return Resolution::Unresolved(Unresolved::UnimplementedIntent { intent });
    }
    notify_rule(source, sink).map_or(
        Resolution::Unresolved(Unresolved::Unsupported),
        Resolution::Resolved,
    )
}

const STORAGE: BindingRule = exports(&[
    Export::source("storage-conn", "connectionString"),
    Export::source("storage-account", "accountName"),
]);
const STORAGE_EVENTS: BindingRule = BindingRule {
    exports: &[Export::link("event-subscription", "subscriptionName")],
    link: Some(SubResource::EventSubscription),
};
const SERVICE_BUS: BindingRule = exports(&[
    Export::source("queue", "queueName"),
    Export::source("conn", "connectionString"),
]);
const KEY_VAULT: BindingRule = exports(&[
    Export::source("keyvault-uri", "vaultUri"),
    Export::source("keyvault-name", "vaultName"),
]);
const COSMOS_FULL: BindingRule = exports(&[
    Export::source("cosmos-endpoint", "endpoint"),
    Export::source("cosmos-database", "databaseName"),
    Export::source("cosmos-container", "containerName"),
]);
const COSMOS: BindingRule = exports(&[
    Export::source("cosmos-endpoint", "endpoint"),
    Export::source("cosmos-database", "databaseName"),
]);
const SQL: BindingRule = exports(&[
    Export::source("sql-server", "serverFqdn"),
    Export::source("sql-database", "databaseName"),
]);
const APP_INSIGHTS: BindingRule = exports(&[
    Export::source("appinsights-key", "instrumentationKey"),
    Export::source("appinsights-conn", "connectionString"),
]);
const API_MANAGEMENT: BindingRule = exports(&[
    Export::source("apim-gateway", "gatewayUrl"),
    Export::source("apim-portal", "portalUrl"),
]);
const VNET: BindingRule = exports(&[
    Export::source("vnet-id", "vnetId"),
    Export::source("vnet-name", "vnetName"),
]);
const FUNCTION_APP: BindingRule = exports(&[
    Export::source("functionapp-url", "url"),
    Export::source("functionapp-name", "appName"),
]);
const CONTAINER_APP: BindingRule = exports(&[
    Export::source("containerapp-fqdn", "fqdn"),
    Export::source("containerapp-name", "appName"),
]);

// A VM pulls the sink's own attributes into its configuration
const VM_STORAGE: BindingRule = exports(&[
    Export::sink("storage-conn", "connectionString"),
    Export::sink("storage-account", "accountName"),
]);
const VM_SERVICE_BUS: BindingRule = exports(&[
    Export::sink("queue", "queueName"),
    Export::sink("conn", "connectionString"),
]);
const VM_KEY_VAULT: BindingRule = exports(&[
    Export::sink("keyvault-uri", "vaultUri"),
    Export::sink("keyvault-name", "vaultName"),
]);
const VM_COSMOS: BindingRule = exports(&[
    Export::sink("cosmos-endpoint", "endpoint"),
    Export::sink("cosmos-database", "databaseName"),
    Export::sink("cosmos-container", "containerName"),
]);
const VM_SQL: BindingRule = exports(&[
    Export::sink("sql-server", "serverFqdn"),
    Export::sink("sql-database", "databaseName"),
]);
const VM_APP_INSIGHTS: BindingRule = exports(&[
    Export::sink("appinsights-key", "instrumentationKey"),
    Export::sink("appinsights-conn", "connectionString"),
]);
const VM_API_MANAGEMENT: BindingRule = exports(&[
    Export::sink("apim-gateway", "gatewayUrl"),
    Export::sink("apim-portal", "portalUrl"),
]);
const VM_VNET: BindingRule = exports(&[
    Export::sink("vnet-id", "vnetId"),
    Export::sink("vnet-name", "vnetName"),
]);
const VM_FUNCTION_APP: BindingRule = exports(&[
    Export::sink("functionapp-url", "url"),
    Export::sink("functionapp-name", "appName"),
]);
const VM_CONTAINER_APP: BindingRule = exports(&[
    Export::sink("containerapp-fqdn", "fqdn"),
    Export::sink("containerapp-name", "appName"),
]);

const fn exports(exports: &'static [Export]) -> BindingRule {
    BindingRule { exports, link: None }
}

fn notify_rule(source: ResourceKind, sink: ResourceKind) -> Option<&'static BindingRule> {
    use ResourceKind::{
        ApiManagement, AppInsights, ContainerApp, CosmosDb, FunctionApp, KeyVault, ServiceBus, Sql, Storage,
        VirtualMachine, VirtualNetwork,
    };

    let rule = match (source, sink) {
        (Storage, ServiceBus) => &STORAGE_EVENTS,
        (Storage, FunctionApp | ContainerApp | Sql | CosmosDb | VirtualMachine | ApiManagement) => &STORAGE,

        (ServiceBus, ContainerApp | FunctionApp | Sql | CosmosDb | VirtualMachine | ApiManagement) => &SERVICE_BUS,

        (
            KeyVault,
            FunctionApp | ContainerApp | Sql | CosmosDb | VirtualMachine | ApiManagement | Storage | ServiceBus,
        ) => &KEY_VAULT,

        (CosmosDb, FunctionApp | ContainerApp) => &COSMOS_FULL,
        (CosmosDb, Storage | ServiceBus) => &COSMOS,

        (Sql, FunctionApp | ContainerApp | Storage | ServiceBus) => &SQL,

        (
            AppInsights,
            FunctionApp | ContainerApp | Sql | CosmosDb | VirtualMachine | ApiManagement | Storage | ServiceBus,
        ) => &APP_INSIGHTS,

        (ApiManagement, FunctionApp | ContainerApp | Sql | CosmosDb | VirtualMachine | Storage | ServiceBus) => {
            &API_MANAGEMENT
        }

        (VirtualNetwork, sink) if sink != VirtualNetwork => &VNET,

        (FunctionApp, ContainerApp) => &FUNCTION_APP,
        (ContainerApp, FunctionApp) => &CONTAINER_APP,

        (VirtualMachine, Storage) => &VM_STORAGE,
        (VirtualMachine, ServiceBus) => &VM_SERVICE_BUS,
        (VirtualMachine, KeyVault) => &VM_KEY_VAULT,
        (VirtualMachine, CosmosDb) => &VM_COSMOS,
        (VirtualMachine, Sql) => &VM_SQL,
        (VirtualMachine, AppInsights) => &VM_APP_INSIGHTS,
        (VirtualMachine, ApiManagement) => &VM_API_MANAGEMENT,
        (VirtualMachine, VirtualNetwork) => &VM_VNET,
        (VirtualMachine, FunctionApp) => &VM_FUNCTION_APP,
        (VirtualMachine, ContainerApp) => &VM_CONTAINER_APP,

        _ => return None,
    };
    Some(rule)
}
