pub fn user_topic_seeds(count: usize, evidence_json: &str, avoid_json: &str) -> String {
    format!(r#"You plan posts for a niche social-media channel. Below are historical posts
from our channel and comparable channels, weighted toward recent and well-received ones.

Propose exactly {count} distinct post topics inspired by this evidence.

Output a JSON array of {count} strings and nothing else:
["topic 1", "topic 2", ...]

CONSTRAINTS:
- Each topic is a short phrase (3–10 words).
- No two topics may be the same idea reworded.
- Do NOT propose any topic from the AVOID list.

EVIDENCE JSON:
<{evidence}>

AVOID JSON:
<{avoid}>"#, count = count, evidence = evidence_json, avoid = avoid_json)
}

pub fn user_plan_item(topic: &str, references_json: &str) -> String {
    format!(r#"Plan one upcoming post for our channel.

TOPIC: {topic}

Reference posts from comparable channels (for inspiration, never copy):
<{refs}>

Output JSON only:
{{"objective":"engagement|storytelling|promotion","tone":"inspiring|casual|adventure","cta":"one short call to action"}}"#, topic = topic, refs = references_json)
}

pub fn user_draft(topic: &str, objective: &str, tone: &str, cta: &str, references_json: &str) -> String {
    format!(r#"Write the post for our channel.

TOPIC: {topic}
OBJECTIVE: {objective}
TONE: {tone}
CALL TO ACTION: {cta}

Reference posts from comparable channels (inspiration only, do not copy phrases):
<{refs}>

Output JSON only:
{{"text":"the full post text"}}

CONSTRAINTS:
- ≤ 1200 characters.
- End with the call to action."#, topic = topic, objective = objective, tone = tone, cta = cta, refs = references_json)
}
