//! System prompt rendering for the chat pipeline.

use database::{ExperienceLevel, User};

/// Persona the assistant keeps across providers. Continuity matters more
/// than vendor defaults, which is why the complex chain degrades within
/// the primary vendor before switching.
const PERSONA: &str = "You are Verdant, a warm and practical plant-care assistant. \
You give specific, actionable advice grounded in the user's actual plants and home \
conditions. You are honest about uncertainty and never invent facts about a plant \
you cannot see. Keep answers short unless the user asks for depth. If the user \
mentions symptoms of disease or pests, walk through diagnosis before treatment.";

/// Render the system prompt: persona plus the user-facts slice.
pub fn render_system_prompt(user: Option<&User>) -> String {
    let mut prompt = PERSONA.to_string();

    if let Some(user) = user {
        prompt.push_str("\n\nYou are talking to ");
        prompt.push_str(&user.display_name);
        prompt.push_str(match user.experience_level {
            ExperienceLevel::Beginner => ", a beginner plant owner. Avoid jargon.",
            ExperienceLevel::Intermediate => ", who has kept plants for a while.",
            ExperienceLevel::Advanced => {
                ", an experienced grower. Technical terminology is welcome."
            }
        });
    }

    prompt
}

/// Wrap the rendered context and the query into the final user turn.
pub fn render_user_turn(context_block: &str, query: &str) -> String {
    if context_block.is_empty() {
        return query.to_string();
    }
    format!("{}\n\n[QUESTION]\n{}", context_block, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use database::SubscriptionTier;
    use uuid::Uuid;

    fn user(level: ExperienceLevel) -> User {
        User {
            id: Uuid::new_v4(),
            display_name: "Ada".to_string(),
            experience_level: level,
            city: None,
            climate_zone: None,
            home_type: None,
            light_level: None,
            humidity_level: None,
            subscription_tier: SubscriptionTier::Free,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_prompt_adapts_to_experience() {
        let beginner = render_system_prompt(Some(&user(ExperienceLevel::Beginner)));
        assert!(beginner.contains("Ada"));
        assert!(beginner.contains("Avoid jargon"));

        let advanced = render_system_prompt(Some(&user(ExperienceLevel::Advanced)));
        assert!(advanced.contains("Technical terminology"));
    }

    #[test]
    fn test_user_turn_without_context_is_bare_query() {
        assert_eq!(render_user_turn("", "why are the leaves yellow?"), "why are the leaves yellow?");
    }

    #[test]
    fn test_user_turn_prefixes_context() {
        let turn = render_user_turn("[ABOUT THE PLANT]\nLocation: desk", "too much sun?");
        assert!(turn.starts_with("[ABOUT THE PLANT]"));
        assert!(turn.ends_with("[QUESTION]\ntoo much sun?"));
    }
}
