// Company extraction prompt.

pub const COMPANY_PROMPT: &str = r#"Analyze this meeting transcript and extract all company/organization names mentioned.

Meeting title: {title}

Transcript:
{transcript}

Instructions:
1. Extract ALL company, organization, or business names mentioned
2. Include implied references only when the context makes the company clear
3. Do NOT include:
   - Generic terms like "the company", "their team", "the client" without clear identification
   - Personal names (unless they're company names like "McKinsey")
   - Product names (unless they're also company names)
   - Government agencies or universities (unless directly relevant to a business relationship)

For each company, provide:
- name: The canonical company name
- type: One of: customer, prospect, partner, vendor, competitor, internal, unknown
- confidence: 0-100 (how confident you are this is a real company mentioned)
- context: Brief note on how the company was mentioned

Return ONLY a JSON array:
[
  {"name": "Company Name", "type": "customer", "confidence": 85, "context": "Discussed as potential client"}
]

If no companies are found, return: []"#;
