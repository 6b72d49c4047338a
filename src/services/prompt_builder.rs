use crate::models::{AnalysisMode, RaidItem};

const VALIDATOR_SYSTEM: &str = "You are an expert RAID (Risks, Assumptions, Issues, Dependencies) data quality validator. \
Your job is to validate RAID items for completeness, clarity, and data quality issues. \
Check that impact and likelihood are consistent with the assigned priority and that the status fits the item type. \
Focus on identifying missing information, ambiguous language, and inconsistencies.";

const ANALYST_SYSTEM: &str = "You are an expert RAID (Risks, Assumptions, Issues, Dependencies) analyst. \
Analyze items carefully and provide clear, actionable recommendations for priority and status. \
Consider impact, likelihood, and business context, and surface mitigation insight where you can.";

pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub fn build_prompt(item: &RaidItem, mode: AnalysisMode) -> Prompt {
    let context = item_context(item);
    match mode {
        AnalysisMode::Validation => Prompt {
            system: VALIDATOR_SYSTEM.to_string(),
            user: format!(
                r#"{context}
Please validate this RAID item for data quality issues. Check for:
1. Completeness of required fields
2. Clarity and specificity of description
3. Alignment between impact/likelihood and priority
4. Appropriateness of status for item type
5. Any missing critical information

Respond in JSON format:
{{
    "analysis": "Brief validation summary",
    "suggestedPriority": "P0|P1|P2|P3",
    "confidence": 0.85,
    "flags": [
        {{"code": "FLAG_CODE", "message": "Issue description", "severity": "low|medium|high", "field": "fieldname"}}
    ]
}}"#
            ),
        },
        AnalysisMode::Analysis => Prompt {
            system: ANALYST_SYSTEM.to_string(),
            user: format!(
                r#"{context}
Based on this information, provide an analysis with recommendations. Consider:
1. Is the priority appropriate given the impact and likelihood?
2. Is the status appropriate for this type of item?
3. Are there any recommendations for mitigation or next steps?
4. What insights can you provide about this item?

Respond in JSON format:
{{
    "analysis": "Your detailed analysis and insights (2-3 sentences)",
    "suggestedPriority": "P0|P1|P2|P3",
    "suggestedStatus": "Proposed|Open|In Progress|Mitigating|Resolved|Closed|Archived",
    "confidence": 0.85,
    "flags": [
        {{"code": "FLAG_CODE", "message": "Any concerns or recommendations", "severity": "low|medium|high", "field": "fieldname"}}
    ]
}}"#
            ),
        },
    }
}

fn item_context(item: &RaidItem) -> String {
    format!(
        "RAID Item Analysis:
- Type: {}
- Title: {}
- Description: {}
- Current Status: {}
- Current Priority: {}
- Impact: {}
- Likelihood: {}
- Workstream: {}
- Owner: {}
- Due Date: {}
",
        item.item_type.as_str(),
        item.title,
        item.description,
        item.status.as_str(),
        item.priority.as_str(),
        item.impact.as_str(),
        item.likelihood.as_str(),
        item.workstream,
        item.owner,
        item.due_date.as_deref().unwrap_or("Not set"),
    )
}

/// Session tag sent alongside the prompt, e.g. `raid-1234`.
pub fn session_tag(item: &RaidItem) -> String {
    match &item.id {
        Some(id) => format!("raid-{id}"),
        None => {
            let slug: String = item
                .title
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
                .collect();
            let slug = slug.trim_matches('-');
            format!("raid-{}", if slug.is_empty() { "item" } else { slug })
        }
    }
}
