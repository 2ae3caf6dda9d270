//! Prompt templates used across the bot.

/// System message every new chat session starts with
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful Discord assistant with access to \
tools for web search, calculation, image generation and the current time. Use the tools \
whenever they can improve your answer instead of guessing. Answer directly and concisely, \
formatted for Discord.";

/// Condense fetched webpage content, keeping what matters for the query
pub fn summarize_prompt(context: &str, question: &str) -> String {
    format!(
        "The following is text content from webpages:\n\n\
         {context}\n\n\
         ---\n\n\
         Summarize the content in about 200 words. Ignore button names and preserve only \
         important information and anything else that may be related to: {question}\n\
         If the content holds no answer, politely inform the user and suggest next steps."
    )
}

/// Problem solving prompt for the calculation model
pub fn calc_prompt(problem: &str) -> String {
    format!(
        "Solve the given problem step by step, making necessary assumptions.\n\
         Avoid showing the intermediate working to the user.\n\
         Answer concisely.\n\n\
         Problem : {problem}"
    )
}

/// Expand a short concept into a detailed illustration prompt
pub fn expand_prompt(concept: &str) -> String {
    format!(
        "Embrace your role as a creative illustrator. Based on a concept provided, you must \
         produce a single paragraph with a multifaceted description of an image, ensuring \
         significant details of the concept and more is represented in your instructions. \
         You do not need to write complete sentences but rather short concepts covering: the \
         level of detail, an artistic style and maybe a specific painter or illustrator, the \
         ideal color palette, lighting, mood, perspective, setting, time of day, weather, \
         season, time period, location, materials, textures, patterns, techniques, medium and \
         genre. If the concept lacks details, use creativity to fill them in; if it already \
         has many, keep and enhance those.\n\n\
         Concept: {concept}\n\n\
         Keep the description length under 300 words.\n\
         Only respond with the new description directly without adding any introductory or \
         concluding remarks."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_prompt_substitution() {
        let prompt = summarize_prompt("some page text", "what is rust?");
        assert!(prompt.contains("some page text"));
        assert!(prompt.contains("related to: what is rust?"));
    }

    #[test]
    fn test_calc_prompt_substitution() {
        let prompt = calc_prompt("2 + 2");
        assert!(prompt.contains("Problem : 2 + 2"));
    }

    #[test]
    fn test_expand_prompt_substitution() {
        let prompt = expand_prompt("a fox in autumn woods");
        assert!(prompt.contains("Concept: a fox in autumn woods"));
    }
}
