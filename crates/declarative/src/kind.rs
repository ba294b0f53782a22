//! Resource kind registry
//!
//! Every supported kind maps to a static [`ResourceDescriptor`]: the ordered
//! sub-resource chain it expands into, its naming rule, the intents it can
//! source or sink, and the property defaults merged under user properties.

use crate::naming::{Charset, NamingRule};
use crate::types::{Intent, Properties};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of supported logical resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "azure.storage")]
    Storage,
    #[serde(rename = "azure.servicebus")]
    ServiceBus,
    #[serde(rename = "azure.containerapp")]
    ContainerApp,
    #[serde(rename = "azure.vm")]
    VirtualMachine,
    #[serde(rename = "azure.functionapp")]
    FunctionApp,
    #[serde(rename = "azure.sql")]
    Sql,
    #[serde(rename = "azure.cosmosdb")]
    CosmosDb,
    #[serde(rename = "azure.apimanagement")]
    ApiManagement,
    #[serde(rename = "azure.keyvault")]
    KeyVault,
    #[serde(rename = "azure.appinsights")]
    AppInsights,
    #[serde(rename = "azure.vnet")]
    VirtualNetwork,
}

impl ResourceKind {
    pub const ALL: [Self; 11] = [
        Self::Storage,
        Self::ServiceBus,
        Self::ContainerApp,
        Self::VirtualMachine,
        Self::FunctionApp,
        Self::Sql,
        Self::CosmosDb,
        Self::ApiManagement,
        Self::KeyVault,
        Self::AppInsights,
        Self::VirtualNetwork,
    ];

    /// Wire name used in graph documents
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Storage => "azure.storage",
            Self::ServiceBus => "azure.servicebus",
            Self::ContainerApp => "azure.containerapp",
            Self::VirtualMachine => "azure.vm",
            Self::FunctionApp => "azure.functionapp",
            Self::Sql => "azure.sql",
            Self::CosmosDb => "azure.cosmosdb",
            Self::ApiManagement => "azure.apimanagement",
            Self::KeyVault => "azure.keyvault",
            Self::AppInsights => "azure.appinsights",
            Self::VirtualNetwork => "azure.vnet",
        }
    }

    /// Look up a kind by its wire name
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    pub const fn descriptor(self) -> &'static ResourceDescriptor {
        match self {
            Self::Storage => &STORAGE,
            Self::ServiceBus => &SERVICE_BUS,
            Self::ContainerApp => &CONTAINER_APP,
            Self::VirtualMachine => &VIRTUAL_MACHINE,
            Self::FunctionApp => &FUNCTION_APP,
            Self::Sql => &SQL,
            Self::CosmosDb => &COSMOS_DB,
            Self::ApiManagement => &API_MANAGEMENT,
            Self::KeyVault => &KEY_VAULT,
            Self::AppInsights => &APP_INSIGHTS,
            Self::VirtualNetwork => &VIRTUAL_NETWORK,
        }
    }

    /// Whether the sanitized name must be unique across all tenants
    pub const fn is_globally_unique(self) -> bool {
        self.descriptor().naming.globally_unique
    }

    /// At most one per location and scope (container apps share a managed environment)
    pub const fn is_single_instance(self) -> bool {
        matches!(self, Self::ContainerApp)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete backend resource a logical node expands into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubResource {
    StorageAccount,
    BlobContainer,
    ServiceBusNamespace,
    ServiceBusQueue,
    ServiceBusAuthRule,
    LogAnalyticsWorkspace,
    ManagedEnvironment,
    ContainerApp,
    VirtualNetwork,
    Subnet,
    PublicIp,
    NetworkInterface,
    VirtualMachine,
    FunctionStorage,
    AppServicePlan,
    FunctionApp,
    SqlServer,
    SqlDatabase,
    SqlFirewallRule,
    CosmosAccount,
    CosmosDatabase,
    CosmosContainer,
    ApiManagementService,
    KeyVault,
    AppInsightsComponent,
    EventSubscription,
}

impl SubResource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StorageAccount => "storageAccount",
            Self::BlobContainer => "blobContainer",
            Self::ServiceBusNamespace => "serviceBusNamespace",
            Self::ServiceBusQueue => "serviceBusQueue",
            Self::ServiceBusAuthRule => "serviceBusAuthRule",
            Self::LogAnalyticsWorkspace => "logAnalyticsWorkspace",
            Self::ManagedEnvironment => "managedEnvironment",
            Self::ContainerApp => "containerApp",
            Self::VirtualNetwork => "virtualNetwork",
            Self::Subnet => "subnet",
            Self::PublicIp => "publicIp",
            Self::NetworkInterface => "networkInterface",
            Self::VirtualMachine => "virtualMachine",
            Self::FunctionStorage => "functionStorage",
            Self::AppServicePlan => "appServicePlan",
            Self::FunctionApp => "functionApp",
            Self::SqlServer => "sqlServer",
            Self::SqlDatabase => "sqlDatabase",
            Self::SqlFirewallRule => "sqlFirewallRule",
            Self::CosmosAccount => "cosmosAccount",
            Self::CosmosDatabase => "cosmosDatabase",
            Self::CosmosContainer => "cosmosContainer",
            Self::ApiManagementService => "apiManagementService",
            Self::KeyVault => "keyVault",
            Self::AppInsightsComponent => "appInsightsComponent",
            Self::EventSubscription => "eventSubscription",
        }
    }

    /// Output attributes the backend returns when this sub-resource is created
    pub const fn outputs(self) -> &'static [&'static str] {
        match self {
            Self::StorageAccount => &["accountName", "connectionString"],
            Self::BlobContainer | Self::CosmosContainer => &["containerName"],
            Self::ServiceBusNamespace => &["namespaceName"],
            Self::ServiceBusQueue => &["queueName"],
            Self::ServiceBusAuthRule => &["connectionString"],
            Self::LogAnalyticsWorkspace => &["workspaceId"],
            Self::ManagedEnvironment => &["environmentId"],
            Self::ContainerApp | Self::FunctionApp => &["appName", "fqdn", "url"],
            Self::VirtualNetwork => &["vnetId", "vnetName", "addressSpace"],
            Self::Subnet => &["subnetId"],
            Self::PublicIp => &["publicIp"],
            Self::NetworkInterface => &["nicId"],
            Self::VirtualMachine => &["vmName", "adminUsername"],
            Self::FunctionStorage => &["storageConnection"],
            Self::AppServicePlan => &["planId"],
            Self::SqlServer => &["serverFqdn"],
            Self::SqlDatabase | Self::CosmosDatabase => &["databaseName"],
            Self::SqlFirewallRule => &["ruleName"],
            Self::CosmosAccount => &["endpoint", "primaryKey"],
            Self::ApiManagementService => &["gatewayUrl", "portalUrl"],
            Self::KeyVault => &["vaultName", "vaultUri"],
            Self::AppInsightsComponent => &["instrumentationKey", "connectionString", "appId"],
            Self::EventSubscription => &["subscriptionName"],
        }
    }

    /// Position in contingency teardown: lower tiers are deleted first
    pub const fn teardown_tier(self) -> TeardownTier {
        match self {
            Self::EventSubscription => TeardownTier::Attachment,
            Self::BlobContainer
            | Self::ServiceBusQueue
            | Self::ServiceBusAuthRule
            | Self::SqlFirewallRule
            | Self::SqlDatabase
            | Self::CosmosContainer
            | Self::ContainerApp
            | Self::VirtualMachine
            | Self::FunctionApp => TeardownTier::Leaf,
            Self::CosmosDatabase
            | Self::ManagedEnvironment
            | Self::NetworkInterface
            | Self::AppServicePlan => TeardownTier::Intermediate,
            Self::PublicIp
            | Self::Subnet
            | Self::LogAnalyticsWorkspace
            | Self::StorageAccount
            | Self::FunctionStorage
            | Self::ServiceBusNamespace
            | Self::SqlServer
            | Self::CosmosAccount
            | Self::KeyVault
            | Self::AppInsightsComponent
            | Self::ApiManagementService => TeardownTier::Grouping,
            Self::VirtualNetwork => TeardownTier::Container,
        }
    }
}

impl fmt::Display for SubResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deletion order class used when no plan record exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeardownTier {
    Attachment,
    Leaf,
    Intermediate,
    Grouping,
    Container,
}

/// One entry of a kind's creation chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
    pub sub_resource: SubResource,
    /// Only part of the chain when this property is set on the node
    pub enabled_by: Option<&'static str>,
}

impl ChainLink {
    const fn always(sub_resource: SubResource) -> Self {
        Self {
            sub_resource,
            enabled_by: None,
        }
    }

    const fn when(sub_resource: SubResource, property: &'static str) -> Self {
        Self {
            sub_resource,
            enabled_by: Some(property),
        }
    }

    pub fn is_enabled(&self, properties: &Properties) -> bool {
        self.enabled_by.is_none_or(|key| {
            properties
                .get(key)
                .is_some_and(|v| !v.is_null() && v.as_str().is_none_or(|s| !s.is_empty()))
        })
    }
}

/// Typed default merged into node properties when absent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Str(&'static str),
    Num(f64),
    Bool(bool),
}

impl DefaultValue {
    pub fn to_value(self) -> serde_json::Value {
        match self {
            Self::Str(s) => serde_json::Value::from(s),
            Self::Num(n) => serde_json::Value::from(n),
            Self::Bool(b) => serde_json::Value::from(b),
        }
    }
}

/// Intents a kind can take part in, on either side of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub sources: &'static [Intent],
    pub sinks: &'static [Intent],
}

impl Capabilities {
    pub fn can_source(&self, intent: Intent) -> bool {
        self.sources.contains(&intent)
    }

    pub fn can_sink(&self, intent: Intent) -> bool {
        self.sinks.contains(&intent)
    }
}

/// Static description of a resource kind
#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub summary: &'static str,
    pub chain: &'static [ChainLink],
    pub naming: NamingRule,
    pub capabilities: Capabilities,
    pub defaults: &'static [(&'static str, DefaultValue)],
    /// Property that replaces the logical name when set
    pub name_override: Option<&'static str>,
}

impl ResourceDescriptor {
    /// Chain entries that apply to a node with these properties
    pub fn steps(&self, properties: &Properties) -> Vec<SubResource> {
        self.chain
            .iter()
            .filter(|link| link.is_enabled(properties))
            .map(|link| link.sub_resource)
            .collect()
    }

    /// Every output attribute a fully created node of this kind exposes
    pub fn outputs(&self) -> Vec<&'static str> {
        let mut outputs: Vec<&'static str> = Vec::new();
        for link in self.chain {
            for attr in link.sub_resource.outputs() {
                if !outputs.contains(attr) {
                    outputs.push(attr);
                }
            }
        }
        outputs
    }

    /// User properties layered over the kind's defaults
    pub fn merge_defaults(&self, properties: &Properties) -> Properties {
        let mut merged: Properties = self
            .defaults
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.to_value()))
            .collect();
        merged.extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

const ALL_INTENTS: &[Intent] = &[Intent::Notify, Intent::Read, Intent::Write, Intent::Invoke];
const NOTIFY: &[Intent] = &[Intent::Notify];
const DATA_SOURCE: &[Intent] = &[Intent::Notify, Intent::Read, Intent::Write];
const COMPUTE_SINK: &[Intent] = &[Intent::Notify, Intent::Read, Intent::Write, Intent::Invoke];
const INVOKER: &[Intent] = &[Intent::Notify, Intent::Invoke];

const DATA_STORE: Capabilities = Capabilities {
    sources: DATA_SOURCE,
    sinks: NOTIFY,
};

const COMPUTE: Capabilities = Capabilities {
    sources: INVOKER,
    sinks: COMPUTE_SINK,
};

const PASSIVE: Capabilities = Capabilities {
    sources: NOTIFY,
    sinks: NOTIFY,
};

const fn hyphenated(min_len: usize, max_len: usize, lead_prefix: &'static str, pad_suffix: &'static str) -> NamingRule {
    NamingRule {
        charset: Charset::LowerAlphanumericHyphen,
        min_len,
        max_len,
        must_start_with_letter: true,
        globally_unique: false,
        lead_prefix,
        pad_suffix,
    }
}

const fn global(rule: NamingRule) -> NamingRule {
    NamingRule {
        globally_unique: true,
        ..rule
    }
}

const STORAGE: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::Storage,
    summary: "Storage account with an optional blob container",
    chain: &[
        ChainLink::always(SubResource::StorageAccount),
        ChainLink::when(SubResource::BlobContainer, "containerName"),
    ],
    naming: NamingRule {
        charset: Charset::LowerAlphanumeric,
        min_len: 3,
        max_len: 24,
        must_start_with_letter: true,
        globally_unique: true,
        lead_prefix: "st",
        pad_suffix: "stx",
    },
    capabilities: DATA_STORE,
    defaults: &[
        ("accountKind", DefaultValue::Str("StorageV2")),
        ("sku", DefaultValue::Str("Standard_LRS")),
        ("accessTier", DefaultValue::Str("Hot")),
    ],
    name_override: Some("accountName"),
};

const SERVICE_BUS: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::ServiceBus,
    summary: "Service Bus namespace, queue and send/listen rule",
    chain: &[
        ChainLink::always(SubResource::ServiceBusNamespace),
        ChainLink::always(SubResource::ServiceBusQueue),
        ChainLink::always(SubResource::ServiceBusAuthRule),
    ],
    naming: global(hyphenated(6, 40, "sb", "bus")),
    capabilities: Capabilities {
        sources: DATA_SOURCE,
        sinks: NOTIFY,
    },
    defaults: &[
        ("sku", DefaultValue::Str("Basic")),
        ("enablePartitioning", DefaultValue::Bool(false)),
    ],
    name_override: None,
};

const CONTAINER_APP: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::ContainerApp,
    summary: "Container app in its own managed environment",
    chain: &[
        ChainLink::always(SubResource::LogAnalyticsWorkspace),
        ChainLink::always(SubResource::ManagedEnvironment),
        ChainLink::always(SubResource::ContainerApp),
    ],
    naming: hyphenated(2, 32, "ca", "app"),
    capabilities: COMPUTE,
    defaults: &[
        ("image", DefaultValue::Str("mcr.microsoft.com/azuredocs/containerapps-helloworld:latest")),
        ("targetPort", DefaultValue::Num(80.0)),
        ("cpu", DefaultValue::Num(0.25)),
        ("memory", DefaultValue::Str("0.5Gi")),
        ("external", DefaultValue::Bool(true)),
    ],
    name_override: None,
};

const VIRTUAL_MACHINE: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::VirtualMachine,
    summary: "Linux virtual machine with network, public IP and NIC",
    chain: &[
        ChainLink::always(SubResource::VirtualNetwork),
        ChainLink::always(SubResource::Subnet),
        ChainLink::always(SubResource::PublicIp),
        ChainLink::always(SubResource::NetworkInterface),
        ChainLink::always(SubResource::VirtualMachine),
    ],
    naming: hyphenated(1, 40, "vm", "vm"),
    capabilities: Capabilities {
        sources: ALL_INTENTS,
        sinks: COMPUTE_SINK,
    },
    defaults: &[
        ("vmSize", DefaultValue::Str("Standard_B1s")),
        ("adminUsername", DefaultValue::Str("azureuser")),
        ("osType", DefaultValue::Str("Linux")),
        ("image", DefaultValue::Str("Ubuntu2204")),
    ],
    name_override: None,
};

const FUNCTION_APP: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::FunctionApp,
    summary: "Function app on a consumption plan with its storage account",
    chain: &[
        ChainLink::always(SubResource::FunctionStorage),
        ChainLink::always(SubResource::AppServicePlan),
        ChainLink::always(SubResource::FunctionApp),
    ],
    naming: NamingRule {
        must_start_with_letter: false,
        ..global(hyphenated(2, 60, "fn", "fn"))
    },
    capabilities: COMPUTE,
    defaults: &[
        ("runtime", DefaultValue::Str("python")),
        ("runtimeVersion", DefaultValue::Str("3.11")),
        ("sku", DefaultValue::Str("Y1")),
    ],
    name_override: None,
};

const SQL: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::Sql,
    summary: "SQL server, database and firewall rule",
    chain: &[
        ChainLink::always(SubResource::SqlServer),
        ChainLink::always(SubResource::SqlDatabase),
        ChainLink::always(SubResource::SqlFirewallRule),
    ],
    naming: NamingRule {
        must_start_with_letter: false,
        ..global(hyphenated(1, 40, "sql", "sql"))
    },
    capabilities: DATA_STORE,
    defaults: &[
        ("administratorLogin", DefaultValue::Str("sqladmin")),
        ("serviceTier", DefaultValue::Str("Basic")),
        ("allowAzureServices", DefaultValue::Bool(true)),
    ],
    name_override: None,
};

const COSMOS_DB: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::CosmosDb,
    summary: "Cosmos DB account, SQL database and container",
    chain: &[
        ChainLink::always(SubResource::CosmosAccount),
        ChainLink::always(SubResource::CosmosDatabase),
        ChainLink::always(SubResource::CosmosContainer),
    ],
    naming: NamingRule {
        must_start_with_letter: false,
        ..global(hyphenated(3, 40, "cosmos", "cdb"))
    },
    capabilities: DATA_STORE,
    defaults: &[
        ("consistencyLevel", DefaultValue::Str("Session")),
        ("partitionKey", DefaultValue::Str("/id")),
        ("throughput", DefaultValue::Num(400.0)),
    ],
    name_override: None,
};

const API_MANAGEMENT: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::ApiManagement,
    summary: "API Management service",
    chain: &[ChainLink::always(SubResource::ApiManagementService)],
    naming: global(hyphenated(1, 40, "apim", "apim")),
    capabilities: Capabilities {
        sources: INVOKER,
        sinks: NOTIFY,
    },
    defaults: &[
        ("publisherEmail", DefaultValue::Str("admin@example.com")),
        ("publisherName", DefaultValue::Str("irforge")),
        ("sku", DefaultValue::Str("Developer")),
    ],
    name_override: None,
};

const KEY_VAULT: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::KeyVault,
    summary: "Key vault",
    chain: &[ChainLink::always(SubResource::KeyVault)],
    naming: global(hyphenated(3, 24, "kv", "kvx")),
    capabilities: DATA_STORE,
    defaults: &[
        ("sku", DefaultValue::Str("standard")),
        ("softDeleteRetentionDays", DefaultValue::Num(7.0)),
    ],
    name_override: None,
};

const APP_INSIGHTS: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::AppInsights,
    summary: "Application Insights component",
    chain: &[ChainLink::always(SubResource::AppInsightsComponent)],
    naming: hyphenated(1, 40, "ai", "ai"),
    capabilities: PASSIVE,
    defaults: &[("applicationType", DefaultValue::Str("web"))],
    name_override: None,
};

const VIRTUAL_NETWORK: ResourceDescriptor = ResourceDescriptor {
    kind: ResourceKind::VirtualNetwork,
    summary: "Virtual network with its subnets",
    chain: &[
        ChainLink::always(SubResource::VirtualNetwork),
        ChainLink::always(SubResource::Subnet),
    ],
    naming: hyphenated(2, 40, "net", "net"),
    capabilities: PASSIVE,
    defaults: &[
        ("addressSpace", DefaultValue::Str("10.0.0.0/16")),
        ("subnetPrefix", DefaultValue::Str("10.0.1.0/24")),
    ],
    name_override: None,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_kind_has_a_nonempty_chain() {
        for kind in ResourceKind::ALL {
            let descriptor = kind.descriptor();
            assert_eq!(descriptor.kind, kind);
            assert!(!descriptor.chain.is_empty(), "{kind} has no chain");
            assert!(descriptor.chain[0].enabled_by.is_none(), "{kind} chain head is optional");
        }
    }

    #[test]
    fn test_wire_names_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_wire(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(ResourceKind::from_wire("azure.nope"), None);
    }

    #[test]
    fn test_storage_container_is_optional() {
        let descriptor = ResourceKind::Storage.descriptor();
        assert_eq!(descriptor.steps(&Properties::new()), vec![SubResource::StorageAccount]);

        let mut props = Properties::new();
        props.insert("containerName".into(), json!("raw"));
        assert_eq!(
            descriptor.steps(&props),
            vec![SubResource::StorageAccount, SubResource::BlobContainer]
        );

        props.insert("containerName".into(), json!(""));
        assert_eq!(descriptor.steps(&props).len(), 1);
    }

    #[test]
    fn test_vm_chain_order() {
        let steps = ResourceKind::VirtualMachine
            .descriptor()
            .steps(&Properties::new());
        assert_eq!(
            steps,
            vec![
                SubResource::VirtualNetwork,
                SubResource::Subnet,
                SubResource::PublicIp,
                SubResource::NetworkInterface,
                SubResource::VirtualMachine,
            ]
        );
    }

    #[test]
    fn test_merge_defaults_keeps_user_values() {
        let mut props = Properties::new();
        props.insert("sku".into(), json!("Premium_LRS"));
        let merged = ResourceKind::Storage.descriptor().merge_defaults(&props);
        assert_eq!(merged["sku"], json!("Premium_LRS"));
        assert_eq!(merged["accountKind"], json!("StorageV2"));
    }

    #[test]
    fn test_outputs_are_deduplicated() {
        let outputs = ResourceKind::ServiceBus.descriptor().outputs();
        assert_eq!(outputs, vec!["namespaceName", "queueName", "connectionString"]);
    }

    #[test]
    fn test_tiers_order_children_before_parents() {
        assert!(SubResource::EventSubscription.teardown_tier() < SubResource::BlobContainer.teardown_tier());
        assert!(SubResource::BlobContainer.teardown_tier() < SubResource::StorageAccount.teardown_tier());
        assert!(SubResource::NetworkInterface.teardown_tier() < SubResource::Subnet.teardown_tier());
        assert!(SubResource::Subnet.teardown_tier() < SubResource::VirtualNetwork.teardown_tier());
    }

    #[test]
    fn test_capabilities() {
        let storage = ResourceKind::Storage.descriptor().capabilities;
        assert!(storage.can_source(Intent::Read));
        assert!(!storage.can_sink(Intent::Invoke));

        let function = ResourceKind::FunctionApp.descriptor().capabilities;
        assert!(function.can_sink(Intent::Invoke));
        for kind in ResourceKind::ALL {
            let caps = kind.descriptor().capabilities;
            assert!(caps.can_source(Intent::Notify) && caps.can_sink(Intent::Notify));
        }
    }
}
