// Speaker enrichment prompt templates.
// All prompts for the speakers module are defined here.

pub const CONTEXT_PROMPT: &str = r#"You are building a professional profile of a meeting participant from their recent meetings.

SPEAKER: {name}
MEETINGS THEY ATTENDED ({meeting_count} total, newest first):
{meetings}

TRANSCRIPT EXCERPTS:
{excerpts}

Summarize what these meetings reveal about {name} professionally.

OUTPUT SCHEMA (return exactly this structure):
{
  "keywords": ["distinctive terms associated with this person"],
  "companies": ["organizations this person appears to work for or with, most likely employer first"],
  "topics": ["subjects this person discusses"],
  "role_hints": ["job titles or functions suggested by the conversation"]
}

Use empty arrays when the material says nothing about a field."#;

pub const VALIDATION_PROMPT: &str = r#"Given this context about a speaker from meeting transcripts:
- Name: {name}
- Companies mentioned: {companies}
- Topics: {topics}
- Role hints: {role_hints}
- Transcript count: {meeting_count}
{hints}
And this web search result:
- Title: {title}
- URL: {url}
- Snippet: {snippet}

Evaluate if this is likely the same person.

OUTPUT SCHEMA (return exactly this structure):
{
  "confidence": 0-100,
  "reasoning": "brief explanation",
  "red_flags": ["reasons this might be a different person"]
}"#;

pub const PROFILE_EXTRACT_PROMPT: &str = r#"Extract professional profile information from this web search result about {name}:

Title: {title}
URL: {url}
Snippet: {snippet}

Meeting context: works with {companies}; discusses {topics}.

OUTPUT SCHEMA (return exactly this structure):
{
  "title": "job title if found, else empty",
  "company": "company if found, else empty",
  "summary": "2-3 sentence professional summary",
  "linkedinUrl": "personal LinkedIn profile URL if found, else null"
}"#;
