//! Usage payloads returned by the upstream provider, and the public summary.
//!
//! Flow amounts are in KB, voice in minutes, money in fen (1/100 yuan).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::kind::ResultKind;
use crate::mask::mask_username;

/// Account credentials supplied with each request.
///
/// The password is never persisted and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Upstream payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Category of a flow bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowCategory {
    /// General-purpose domestic flow.
    Common,
    /// App- or service-specific flow.
    Special,
}

/// One flow bucket in the upstream "important data" payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowItem {
    pub name: String,
    pub category: FlowCategory,
    /// Used amount in KB.
    #[serde(rename = "use")]
    pub used: i64,
    /// Total amount in KB.
    pub total: i64,
}

/// Account overview returned by the upstream `qryImportantData` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportantData {
    pub phonenum: String,
    /// Account balance in fen.
    pub balance: i64,
    pub voice_usage: i64,
    pub voice_total: i64,
    #[serde(default)]
    pub flow_items: Vec<FlowItem>,
}

/// A product inside a resource package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageProduct {
    pub title: String,
    /// Used amount as displayed by the provider, e.g. `52.92MB`.
    pub used: String,
    /// Total amount; `None` means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<String>,
}

/// A group of products, e.g. domestic general flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePackage {
    pub title: String,
    #[serde(default)]
    pub products: Vec<PackageProduct>,
}

/// Flow package breakdown returned by the upstream `userFluxPackage` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxPackage {
    #[serde(default)]
    pub packages: Vec<ResourcePackage>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Summary
// ─────────────────────────────────────────────────────────────────────────────

/// One flow bucket in the public summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryFlowItem {
    pub name: String,
    #[serde(rename = "use")]
    pub used: i64,
    pub balance: i64,
    pub total: i64,
}

/// The public, reduced view of an account served by `/show/flow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub username: String,
    pub balance: i64,
    pub voice_usage: i64,
    pub voice_total: i64,
    pub voice_balance: i64,
    pub flow_use: i64,
    pub flow_total: i64,
    pub common_use: i64,
    pub common_total: i64,
    pub special_use: i64,
    pub special_total: i64,
    pub flow_items: Vec<SummaryFlowItem>,
    /// When the summary was built, `%Y-%m-%d %H:%M:%S` UTC.
    pub create_time: String,
}

impl Summary {
    /// Reduce an upstream payload to the public summary shape.
    pub fn from_important_data(
        username: &str,
        data: &ImportantData,
        created_at: Timestamp,
    ) -> Self {
        // Upstream figures are untrusted; sums saturate rather than wrap.
        let (mut common_use, mut common_total) = (0i64, 0i64);
        let (mut special_use, mut special_total) = (0i64, 0i64);
        for item in &data.flow_items {
            match item.category {
                FlowCategory::Common => {
                    common_use = common_use.saturating_add(item.used);
                    common_total = common_total.saturating_add(item.total);
                }
                FlowCategory::Special => {
                    special_use = special_use.saturating_add(item.used);
                    special_total = special_total.saturating_add(item.total);
                }
            }
        }

        let flow_items = data
            .flow_items
            .iter()
            .map(|item| SummaryFlowItem {
                name: item.name.clone(),
                used: item.used,
                balance: item.total.saturating_sub(item.used).max(0),
                total: item.total,
            })
            .collect();

        let create_time = chrono::DateTime::from_timestamp(created_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        Self {
            username: username.to_string(),
            balance: data.balance,
            voice_usage: data.voice_usage,
            voice_total: data.voice_total,
            voice_balance: data.voice_total.saturating_sub(data.voice_usage).max(0),
            flow_use: common_use.saturating_add(special_use),
            flow_total: common_total.saturating_add(special_total),
            common_use,
            common_total,
            special_use,
            special_total,
            flow_items,
            create_time,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UsageData
// ─────────────────────────────────────────────────────────────────────────────

/// Any value the user cache can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UsageData {
    Summary(Summary),
    Detail(ImportantData),
    FluxPackage(FluxPackage),
}

impl UsageData {
    pub fn kind(&self) -> ResultKind {
        match self {
            UsageData::Summary(_) => ResultKind::Summary,
            UsageData::Detail(_) => ResultKind::Detail,
            UsageData::FluxPackage(_) => ResultKind::FluxPackage,
        }
    }

    /// Copy with account identifiers masked for public output.
    pub fn masked(&self) -> Self {
        match self {
            UsageData::Summary(s) => UsageData::Summary(Summary {
                username: mask_username(&s.username),
                ..s.clone()
            }),
            UsageData::Detail(d) => UsageData::Detail(ImportantData {
                phonenum: mask_username(&d.phonenum),
                ..d.clone()
            }),
            UsageData::FluxPackage(p) => UsageData::FluxPackage(p.clone()),
        }
    }
}
