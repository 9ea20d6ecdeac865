//! Conditional Access policy model and retrieval via Microsoft Graph API
//!
//! Models the `conditionalAccessPolicy` resource as read from
//! `identity/conditionalAccess/policies`. Enumerated values keep their Graph
//! wire spelling, which is also what the azuread provider expects.

use crate::error::{Ca2TfError, Result};
use crate::graph::GraphClient;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const POLICIES_ENDPOINT: &str = "identity/conditionalAccess/policies";

/// Enumerations with a fixed Graph wire spelling
pub trait WireEnum: Copy + Sized + 'static {
    fn as_str(&self) -> &'static str;
    fn from_wire(value: &str) -> Option<Self>;
}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl WireEnum for $name {
            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            fn from_wire(value: &str) -> Option<Self> {
                match value {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// Lifecycle state of a policy
    PolicyState {
        Enabled => "enabled",
        Disabled => "disabled",
        EnabledForReportingButNotEnforced => "enabledForReportingButNotEnforced",
    }
);

wire_enum!(ClientAppType {
    All => "all",
    Browser => "browser",
    MobileAppsAndDesktopClients => "mobileAppsAndDesktopClients",
    ExchangeActiveSync => "exchangeActiveSync",
    EasSupported => "easSupported",
    Other => "other",
    UnknownFutureValue => "unknownFutureValue",
});

wire_enum!(
    /// Shared by sign-in, user and service principal risk conditions
    RiskLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
        Hidden => "hidden",
        None => "none",
        UnknownFutureValue => "unknownFutureValue",
    }
);

wire_enum!(DevicePlatform {
    Android => "android",
    IOS => "iOS",
    Windows => "windows",
    WindowsPhone => "windowsPhone",
    MacOS => "macOS",
    Linux => "linux",
    All => "all",
    UnknownFutureValue => "unknownFutureValue",
});

wire_enum!(FilterMode {
    Include => "include",
    Exclude => "exclude",
});

wire_enum!(GrantOperator {
    And => "AND",
    Or => "OR",
});

wire_enum!(BuiltInControl {
    Block => "block",
    Mfa => "mfa",
    CompliantDevice => "compliantDevice",
    DomainJoinedDevice => "domainJoinedDevice",
    ApprovedApplication => "approvedApplication",
    CompliantApplication => "compliantApplication",
    PasswordChange => "passwordChange",
    UnknownFutureValue => "unknownFutureValue",
});

wire_enum!(SignInFrequencyType {
    Days => "days",
    Hours => "hours",
});

wire_enum!(SignInFrequencyAuthenticationType {
    PrimaryAndSecondaryAuthentication => "primaryAndSecondaryAuthentication",
    SecondaryAuthentication => "secondaryAuthentication",
    UnknownFutureValue => "unknownFutureValue",
});

wire_enum!(SignInFrequencyInterval {
    TimeBased => "timeBased",
    EveryTime => "everyTime",
    UnknownFutureValue => "unknownFutureValue",
});

wire_enum!(CloudAppSecurityType {
    McasConfigured => "mcasConfigured",
    MonitorOnly => "monitorOnly",
    BlockDownloads => "blockDownloads",
    UnknownFutureValue => "unknownFutureValue",
});

wire_enum!(PersistentBrowserMode {
    Always => "always",
    Never => "never",
});

wire_enum!(
    /// Reserved values in user and group include/exclude lists
    PrincipalSentinel {
        All => "All",
        None => "None",
        GuestsOrExternalUsers => "GuestsOrExternalUsers",
    }
);

wire_enum!(
    /// Reserved values in location include/exclude lists
    LocationSentinel {
        All => "All",
        AllTrusted => "AllTrusted",
    }
);

/// An entry of an include/exclude list: a reserved keyword or a directory object ID.
/// Decided once when the policy is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryRef<S> {
    Sentinel(S),
    Id(String),
}

pub type PrincipalRef = DirectoryRef<PrincipalSentinel>;
pub type LocationRef = DirectoryRef<LocationSentinel>;

impl<S: WireEnum> DirectoryRef<S> {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match S::from_wire(&raw) {
            Some(sentinel) => DirectoryRef::Sentinel(sentinel),
            None => DirectoryRef::Id(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DirectoryRef::Sentinel(s) => s.as_str(),
            DirectoryRef::Id(id) => id,
        }
    }
}

impl<'de, S: WireEnum> Deserialize<'de> for DirectoryRef<S> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::parse)
    }
}

impl<S: WireEnum> Serialize for DirectoryRef<S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> std::result::Result<Ser::Ok, Ser::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Graph sends `null` for many empty collections
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Conditional Access Policy structure for typed responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalAccessPolicy {
    pub id: String,
    pub display_name: String,
    pub state: PolicyState,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub modified_date_time: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conditions: PolicyConditions,
    #[serde(default)]
    pub grant_controls: Option<GrantControls>,
    #[serde(default)]
    pub session_controls: Option<SessionControls>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConditions {
    #[serde(default)]
    pub users: Option<UserCondition>,
    #[serde(default)]
    pub applications: Option<ApplicationCondition>,
    #[serde(default)]
    pub client_applications: Option<ClientApplicationCondition>,
    #[serde(default)]
    pub devices: Option<DeviceCondition>,
    #[serde(default)]
    pub locations: Option<LocationCondition>,
    #[serde(default)]
    pub platforms: Option<PlatformCondition>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub client_app_types: Vec<ClientAppType>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sign_in_risk_levels: Vec<RiskLevel>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_risk_levels: Vec<RiskLevel>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub service_principal_risk_levels: Vec<RiskLevel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCondition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_users: Vec<PrincipalRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exclude_users: Vec<PrincipalRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_groups: Vec<PrincipalRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exclude_groups: Vec<PrincipalRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_roles: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exclude_roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCondition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_applications: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exclude_applications: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_user_actions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientApplicationCondition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_service_principals: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exclude_service_principals: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCondition {
    #[serde(default)]
    pub device_filter: Option<DeviceFilter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceFilter {
    pub mode: FilterMode,
    pub rule: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCondition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_locations: Vec<LocationRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exclude_locations: Vec<LocationRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCondition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_platforms: Vec<DevicePlatform>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exclude_platforms: Vec<DevicePlatform>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantControls {
    pub operator: GrantOperator,
    #[serde(default, deserialize_with = "null_as_default")]
    pub built_in_controls: Vec<BuiltInControl>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub custom_authentication_factors: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub terms_of_use: Vec<String>,
    #[serde(default)]
    pub authentication_strength: Option<AuthenticationStrength>,
}

/// Only the ID is carried; it is emitted verbatim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationStrength {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionControls {
    #[serde(default)]
    pub application_enforced_restrictions: Option<ApplicationEnforcedRestrictions>,
    #[serde(default)]
    pub cloud_app_security: Option<CloudAppSecurity>,
    #[serde(default)]
    pub disable_resilience_defaults: Option<bool>,
    #[serde(default)]
    pub persistent_browser: Option<PersistentBrowser>,
    #[serde(default)]
    pub sign_in_frequency: Option<SignInFrequency>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationEnforcedRestrictions {
    #[serde(default)]
    pub is_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudAppSecurity {
    #[serde(default)]
    pub is_enabled: Option<bool>,
    #[serde(default)]
    pub cloud_app_security_type: Option<CloudAppSecurityType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentBrowser {
    #[serde(default)]
    pub is_enabled: Option<bool>,
    #[serde(default)]
    pub mode: Option<PersistentBrowserMode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInFrequency {
    #[serde(default)]
    pub is_enabled: Option<bool>,
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default, rename = "type")]
    pub frequency_type: Option<SignInFrequencyType>,
    #[serde(default)]
    pub authentication_type: Option<SignInFrequencyAuthenticationType>,
    #[serde(default)]
    pub frequency_interval: Option<SignInFrequencyInterval>,
}

/// Where the full, ordered policy set comes from
#[allow(async_fn_in_trait)]
pub trait PolicySource {
    /// All policies in service order. A partial set is never returned.
    async fn fetch_policies(&self) -> Result<Vec<ConditionalAccessPolicy>>;
}

impl PolicySource for GraphClient {
    async fn fetch_policies(&self) -> Result<Vec<ConditionalAccessPolicy>> {
        self.get_all_pages(POLICIES_ENDPOINT)
            .await
            .map_err(|e| Ca2TfError::SourceFetchError(e.to_string()))
    }
}
