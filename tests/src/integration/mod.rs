//! Cross-facet integration flows.

pub mod dispatch_flows;
pub mod platform_flows;
