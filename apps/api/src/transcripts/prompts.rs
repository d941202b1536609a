// Ingest-time analysis prompts.

pub const TOPIC_PROMPT: &str = r#"Based on this meeting transcript, generate a descriptive topic title (10-20 words) that captures:
1. The main subject or purpose of the meeting
2. Key companies, products, or people mentioned
3. Specific topics or decisions discussed

Meeting title: {title}

Transcript excerpt:
{transcript}

Return ONLY the topic title, nothing else. Use a dash to separate the main topic from details.

Examples of good topic titles:
- "Partnership discussion - AWS and Azure integration challenges and go-to-market strategy"
- "Q4 Sales Review - ACME Corp deal progress, pipeline forecast, and team quotas"
- "Product roadmap planning - mobile app redesign priorities and Q1 launch timeline"
- "Weekly team standup - sprint progress, blockers on auth feature, and upcoming PTO"

Generate a similarly detailed topic title for this meeting."#;

pub const PRIVACY_PROMPT: &str = r#"Analyze this meeting transcript and determine its privacy level.

Meeting title: {title}

Transcript:
{transcript}

Classify the meeting into ONE of these categories:
1. "work" - Clearly work-related: project discussions, client meetings, business strategy, code reviews, team standups, product planning.
2. "work_with_private" - Primarily work but contains private or sensitive topics: health issues, family matters, personal finances, vacation planning, salary discussions.
3. "likely_private" - Appears to be a personal conversation: medical appointments, therapy sessions, legal consultations, family discussions, friend chats.

OUTPUT SCHEMA (return exactly this structure):
{
  "level": "work" | "work_with_private" | "likely_private",
  "reason": "Brief 1-2 sentence explanation of the classification",
  "topics": ["sensitive topics found"],
  "confidence": 0-100,
  "work_percent": 0-100
}"#;
