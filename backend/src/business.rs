//! Business functions: caller-selected routing tags forwarded to the
//! workflow engine, plus their URL slugs and starter prompts.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
pub enum BusinessFunction {
    #[default]
    #[serde(rename = "AI Accelerate")]
    AiAccelerate,
    Sales,
    Marketing,
    #[serde(rename = "Customer Success")]
    CustomerSuccess,
    #[serde(rename = "Customer Service")]
    CustomerService,
    Operations,
    Finance,
    #[serde(rename = "HR")]
    Hr,
}

impl BusinessFunction {
    pub const ALL: [BusinessFunction; 8] = [
        BusinessFunction::AiAccelerate,
        BusinessFunction::Sales,
        BusinessFunction::Marketing,
        BusinessFunction::CustomerSuccess,
        BusinessFunction::CustomerService,
        BusinessFunction::Operations,
        BusinessFunction::Finance,
        BusinessFunction::Hr,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BusinessFunction::AiAccelerate => "AI Accelerate",
            BusinessFunction::Sales => "Sales",
            BusinessFunction::Marketing => "Marketing",
            BusinessFunction::CustomerSuccess => "Customer Success",
            BusinessFunction::CustomerService => "Customer Service",
            BusinessFunction::Operations => "Operations",
            BusinessFunction::Finance => "Finance",
            BusinessFunction::Hr => "HR",
        }
    }

    /// The default sentinel: routes to the general workflow with no `functions` filter.
    pub fn is_default(self) -> bool {
        self == BusinessFunction::AiAccelerate
    }

    /// URL slug; the default function lives at the root path.
    pub fn slug(self) -> &'static str {
        match self {
            BusinessFunction::AiAccelerate => "",
            BusinessFunction::Sales => "sales",
            BusinessFunction::Marketing => "marketing",
            BusinessFunction::CustomerSuccess => "customer-success",
            BusinessFunction::CustomerService => "customer-service",
            BusinessFunction::Operations => "operations",
            BusinessFunction::Finance => "finance",
            BusinessFunction::Hr => "hr",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        let slug = slug.strip_prefix('/').unwrap_or(slug);
        Self::ALL.into_iter().find(|bf| bf.slug() == slug)
    }

    /// Resolve from a page pathname. `/chat/...` pages carry the function in
    /// chat data, not the URL, so they resolve to `None`.
    pub fn from_pathname(pathname: &str) -> Option<Self> {
        match pathname.split('/').find(|s| !s.is_empty()) {
            None => Some(BusinessFunction::AiAccelerate),
            Some("chat") => None,
            Some(first) => Self::from_slug(first),
        }
    }

    pub fn suggested_actions(self) -> [&'static str; 4] {
        match self {
            BusinessFunction::Sales => [
                "Calculate ROI for AI automation in my Sales team",
                "What's the ROI for automating lead qualification and follow-ups?",
                "Help me assess ROI for Sales pipeline automation",
                "What's the ROI for AI-powered sales forecasting and reporting?",
            ],
            BusinessFunction::Marketing => [
                "Calculate ROI for Marketing automation and campaign management",
                "What's the ROI for AI-powered content creation and personalization?",
                "Help me assess ROI for Marketing analytics and reporting automation",
                "What's the ROI for automating lead scoring and segmentation?",
            ],
            BusinessFunction::CustomerSuccess | BusinessFunction::CustomerService => [
                "Calculate ROI for Customer Success automation and retention initiatives",
                "What's the ROI for AI-powered customer health scoring and churn prediction?",
                "Help me assess ROI for automating customer onboarding and success workflows",
                "What's the ROI for customer engagement and expansion automation?",
            ],
            BusinessFunction::Operations => [
                "Calculate ROI for Operations automation and process optimization",
                "What's the ROI for AI-powered supply chain and logistics automation?",
                "Help me assess ROI for automating operational workflows and task management",
                "What's the ROI for operational analytics and reporting automation?",
            ],
            BusinessFunction::Finance => [
                "Calculate ROI for Finance automation and financial process optimization",
                "What's the ROI for AI-powered financial analysis and forecasting?",
                "Help me assess ROI for automating accounting, invoicing, and reconciliation",
                "What's the ROI for financial reporting and compliance automation?",
            ],
            BusinessFunction::Hr => [
                "Calculate ROI for HR automation and talent management optimization",
                "What's the ROI for AI-powered recruitment and candidate screening?",
                "Help me assess ROI for automating onboarding, training, and performance management",
                "What's the ROI for HR analytics and workforce planning automation?",
            ],
            BusinessFunction::AiAccelerate => [
                "I would like to estimate AI ROI. What type of AI automation are you considering?",
                "Calculate ROI for general AI automation and efficiency improvements",
                "Help me assess ROI for business process optimization with AI",
                "What's the financial impact of AI automation across departments?",
            ],
        }
    }
}

impl std::fmt::Display for BusinessFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BusinessFunctionInfo {
    pub id: BusinessFunction,
    pub label: String,
    pub slug: String,
    pub suggested_actions: Vec<String>,
}

impl From<BusinessFunction> for BusinessFunctionInfo {
    fn from(bf: BusinessFunction) -> Self {
        Self {
            id: bf,
            label: bf.label().to_string(),
            slug: bf.slug().to_string(),
            suggested_actions: bf.suggested_actions().iter().map(|s| s.to_string()).collect(),
        }
    }
}
