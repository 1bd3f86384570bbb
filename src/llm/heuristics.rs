//! Regex heuristics used when no LLM is available.
//!
//! Covers the handful of fact shapes the chat loop cares about: the user's
//! name, allergies, likes and best friend.

use regex::Regex;
use std::collections::HashSet;

/// Words that follow "I'm" but are not names ("I'm allergic to ...").
const NOT_NAMES: &[&str] = &[
    "a", "an", "the", "not", "so", "very", "really", "just", "also", "allergic", "from", "in",
    "at", "on", "here", "there", "going", "feeling", "looking", "trying", "doing", "good",
    "fine", "ok", "okay", "great", "tired", "hungry", "happy", "sad", "sorry", "glad", "sure",
    "back", "still", "working", "thinking", "new", "vegan", "vegetarian",
];

const FOOD_KEYWORDS: &[&str] = &[
    "biryani", "pasta", "pizza", "rice", "burger", "curry", "noodle", "salad", "food", "dish",
    "cuisine", "chicken", "paneer", "dessert", "italian", "indian",
];

const FOOD_INTENT_WORDS: &[&str] = &[
    "dinner", "lunch", "breakfast", "eat", "meal", "food", "hungry", "flavorful", "flavourful",
];

/// Compiled patterns for heuristic extraction and canned replies
pub struct Heuristics {
    // Extraction from user messages
    name_intro: Regex,
    allergy_intro: Regex,
    preference_intro: Regex,
    best_friend_intro: Regex,
    and_split: Regex,
    item_split: Regex,
    leading_article: Regex,

    // Canonical fact shapes
    combo_fact: Regex,
    name_fact: Regex,
    allergy_fact: Regex,
    preference_fact: Regex,
    best_friend_fact: Regex,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self::new()
    }
}

impl Heuristics {
    pub fn new() -> Self {
        Self {
            name_intro: Regex::new(r"(?i)\b(?:i am|i'm|my name is)\s+([A-Za-z]+)\b").unwrap(),
            allergy_intro: Regex::new(r"(?i)\ballergic to\s+([^.!?,;]+)").unwrap(),
            preference_intro: Regex::new(r"(?i)\b(?:i love|i like|i enjoy|i prefer)\s+([^.!?]+)")
                .unwrap(),
            best_friend_intro: Regex::new(r"(?i)\bmy\s+best\s*friend\s+is\s+([A-Za-z][A-Za-z\s'-]*)")
                .unwrap(),
            and_split: Regex::new(r"(?i)\band\b").unwrap(),
            item_split: Regex::new(r"(?i),| and also | also | plus | & | and ").unwrap(),
            leading_article: Regex::new(r"(?i)^(?:the|a|an)\s+").unwrap(),

            combo_fact: Regex::new(r"(?i)^user is allergic to\s+(.+?)\s+and\s+i\s+(?:love|like)\s+(.+)$")
                .unwrap(),
            name_fact: Regex::new(r"(?i)^user'?s?\s+name\s+is\s+(.+)$").unwrap(),
            allergy_fact: Regex::new(r"(?i)^user is allergic to\s+(.+)$").unwrap(),
            preference_fact: Regex::new(r"(?i)^user (?:likes|loves|enjoys|prefers)\s+(.+)$").unwrap(),
            best_friend_fact: Regex::new(r"(?i)^user'?s?\s+best\s*friend\s+is\s+(.+)$").unwrap(),
        }
    }

    /// Pull facts out of a user message without an LLM. Questions yield nothing.
    pub fn extract(&self, text: &str) -> Vec<String> {
        if text.trim().ends_with('?') {
            return Vec::new();
        }

        let mut facts = Vec::new();

        if let Some(name) = self.introduced_name(text) {
            facts.push(format!("User's name is {}", name));
        }

        if let Some(caps) = self.allergy_intro.captures(text) {
            let raw = &caps[1];
            let allergy = self.and_split.split(raw).next().unwrap_or(raw).trim();
            if !allergy.is_empty() {
                facts.push(format!("User is allergic to {}", allergy));
            }
        }

        for caps in self.preference_intro.captures_iter(text) {
            for item in self.split_preference_items(&caps[1]) {
                facts.push(format!("User likes {}", item));
            }
        }

        if let Some(caps) = self.best_friend_intro.captures(text) {
            facts.push(format!("User's best friend is {}", caps[1].trim()));
        }

        facts
    }

    /// Name from "I'm X" / "my name is X", skipping words that are not names.
    fn introduced_name<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.name_intro
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .find(|word| !NOT_NAMES.contains(&word.to_lowercase().as_str()))
    }

    /// Split "pasta, pizza and also sushi" into its items.
    fn split_preference_items(&self, raw: &str) -> Vec<String> {
        let cleaned = trim_item(raw);
        if cleaned.is_empty() {
            return Vec::new();
        }

        self.item_split
            .split(cleaned)
            .map(trim_item)
            .map(|item| self.leading_article.replace(item, "").to_string())
            .filter(|item| item.chars().count() >= 2)
            .collect()
    }

    /// Canonicalise fact phrasing and drop case-insensitive duplicates.
    ///
    /// "User loves X" becomes "User likes X", a combined
    /// "User is allergic to X and I love Y" becomes two facts.
    pub fn normalize_facts<S: AsRef<str>>(&self, facts: &[S]) -> Vec<String> {
        let mut normalized = Vec::new();

        for fact in facts {
            let cleaned = fact.as_ref().trim();
            if cleaned.is_empty() {
                continue;
            }

            if let Some(caps) = self.combo_fact.captures(cleaned) {
                let allergy = trim_item(&caps[1]);
                let preference = trim_item(&caps[2]);
                if !allergy.is_empty() {
                    normalized.push(format!("User is allergic to {}", allergy));
                }
                if !preference.is_empty() {
                    normalized.push(format!("User likes {}", preference));
                }
            } else if let Some(caps) = self.preference_fact.captures(cleaned) {
                let preference = trim_item(&caps[1]);
                if !preference.is_empty() {
                    normalized.push(format!("User likes {}", preference));
                }
            } else if let Some(caps) = self.name_fact.captures(cleaned) {
                normalized.push(format!("User's name is {}", trim_item(&caps[1])));
            } else if let Some(caps) = self.best_friend_fact.captures(cleaned) {
                normalized.push(format!("User's best friend is {}", trim_item(&caps[1])));
            } else {
                normalized.push(cleaned.to_string());
            }
        }

        let mut seen = HashSet::new();
        normalized.retain(|fact| seen.insert(fact.to_lowercase()));
        normalized
    }

    /// Answer common personal questions straight from memory.
    ///
    /// `known_facts` must be oldest first: when the user has given more than
    /// one name or best friend, the latest is used. Returns `None` when the
    /// message needs a real answer.
    pub fn deterministic_reply(&self, user_message: &str, known_facts: &[String]) -> Option<String> {
        let lower = user_message.to_lowercase();
        let remembered = Remembered::collect(self, known_facts);

        let is_question = user_message.trim().ends_with('?');
        let introduces_name = !is_question && self.introduced_name(user_message).is_some();
        if (lower.contains("my name") || lower.contains("who am i")) && !introduces_name {
            return Some(match remembered.name {
                Some(name) => format!("Your name is {}.", name),
                None => "I do not have your name saved yet.".to_string(),
            });
        }

        if lower.contains("allergic") && !self.allergy_intro.is_match(user_message) {
            return Some(if remembered.allergies.is_empty() {
                "I do not have any allergy memory saved yet.".to_string()
            } else {
                format!(
                    "You told me you are allergic to {}.",
                    remembered.allergies.join(", ")
                )
            });
        }

        if self.best_friend_intro.is_match(user_message) {
            return Some("Thanks for sharing. I will remember that.".to_string());
        }

        if lower.contains("bestfriend") || lower.contains("best friend") {
            return Some(match remembered.best_friend {
                Some(friend) => format!("Your best friend is {}.", friend),
                None => "I do not know your best friend yet. You can tell me by saying: My best friend is <name>.".to_string(),
            });
        }

        if lower.contains("what do i love") || lower.contains("what do i like") {
            return Some(if remembered.preferences.is_empty() {
                "I do not have any saved preference yet.".to_string()
            } else {
                format!(
                    "You told me you like {}.",
                    order_preferences(&remembered.preferences).join(", ")
                )
            });
        }

        if lower.contains("suggest") {
            if let Some(preferred) = pick_preferred_item(&remembered.preferences) {
                return Some(format!(
                    "Since you like {preferred}, you can try it in two ways tonight: \
                     1) classic style, 2) spicy chef-special version."
                ));
            }
        }

        let food_intent = FOOD_INTENT_WORDS.iter().any(|word| lower.contains(word));
        if food_intent {
            if let Some(top) = pick_preferred_item(&remembered.preferences) {
                if remembered.allergies.is_empty() {
                    return Some(format!(
                        "Since you like {top}, try this: {top} with extra herbs and bold spices. \
                         If you want, I can give 3 specific dish options next."
                    ));
                }
                return Some(format!(
                    "Since you like {top}, try a flavorful {top} dish made without {}.",
                    remembered.allergies.join(", ")
                ));
            }
            if !remembered.allergies.is_empty() {
                return Some(format!(
                    "A rice bowl with roasted vegetables could be a good option tonight, made without {}.",
                    remembered.allergies.join(", ")
                ));
            }
        }

        if !self.extract(user_message).is_empty() {
            return Some("Thanks for sharing. I will remember that.".to_string());
        }

        None
    }

    /// Last-resort reply when neither the canned answers nor the LLM apply.
    pub fn fallback_reply(&self, memory_facts: &[String]) -> String {
        match memory_facts.first() {
            Some(fact) => format!("I remember this about you: {}.", fact),
            None => "I can help with that. Could you share a bit more detail so I can personalize the suggestion?".to_string(),
        }
    }
}

/// Facts about the user recovered from canonical memory strings
struct Remembered {
    name: Option<String>,
    allergies: Vec<String>,
    preferences: Vec<String>,
    best_friend: Option<String>,
}

impl Remembered {
    fn collect(heuristics: &Heuristics, facts: &[String]) -> Self {
        let capture = |re: &Regex, fact: &str| {
            re.captures(fact.trim())
                .map(|caps| caps[1].trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut remembered = Self {
            name: None,
            allergies: Vec::new(),
            preferences: Vec::new(),
            best_friend: None,
        };

        // Facts arrive oldest first; a newer name or best friend replaces the older one
        for fact in facts {
            if let Some(name) = capture(&heuristics.name_fact, fact.as_str()) {
                remembered.name = Some(name);
            }
            if let Some(friend) = capture(&heuristics.best_friend_fact, fact.as_str()) {
                remembered.best_friend = Some(friend);
            }
            if let Some(allergy) = capture(&heuristics.allergy_fact, fact.as_str()) {
                push_unique(&mut remembered.allergies, allergy);
            }
            if let Some(preference) = capture(&heuristics.preference_fact, fact.as_str()) {
                push_unique(&mut remembered.preferences, preference);
            }
        }

        remembered
    }
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
        values.push(value);
    }
}

fn trim_item(value: &str) -> &str {
    value.trim_matches(|c: char| c == '.' || c.is_whitespace())
}

fn is_food(preference: &str) -> bool {
    let lower = preference.to_lowercase();
    FOOD_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// First food-like preference, else the first preference.
fn pick_preferred_item(preferences: &[String]) -> Option<&str> {
    preferences
        .iter()
        .find(|p| is_food(p))
        .or_else(|| preferences.first())
        .map(String::as_str)
}

/// Food-like preferences first, original order otherwise.
fn order_preferences(preferences: &[String]) -> Vec<&str> {
    let (food, other): (Vec<&String>, Vec<&String>) = preferences.iter().partition(|p| is_food(p));
    food.into_iter().chain(other).map(String::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn facts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_name_and_allergy() {
        let h = Heuristics::new();
        let got = h.extract("I'm Priya and I'm allergic to peanuts and shellfish.");
        assert_eq!(got, facts(&["User's name is Priya", "User is allergic to peanuts"]));
    }

    #[test]
    fn test_extract_my_name_is() {
        let h = Heuristics::new();
        assert_eq!(h.extract("my name is Priya."), facts(&["User's name is Priya"]));
    }

    #[test]
    fn test_extract_skips_non_names() {
        let h = Heuristics::new();
        let got = h.extract("I'm allergic to cats");
        assert_eq!(got, facts(&["User is allergic to cats"]));
    }

    #[test]
    fn test_extract_preferences_split() {
        let h = Heuristics::new();
        let got = h.extract("I love the pasta, pizza and also sushi. I prefer tea");
        assert_eq!(
            got,
            facts(&["User likes pasta", "User likes pizza", "User likes sushi", "User likes tea"])
        );
    }

    #[test]
    fn test_extract_best_friend() {
        let h = Heuristics::new();
        let got = h.extract("My best friend is Arjun");
        assert_eq!(got, facts(&["User's best friend is Arjun"]));
    }

    #[test]
    fn test_questions_extract_nothing() {
        let h = Heuristics::new();
        assert!(h.extract("Do you know I'm Priya?").is_empty());
        assert!(h.extract("hello there").is_empty());
    }

    #[test]
    fn test_normalize_facts() {
        let h = Heuristics::new();
        let got = h.normalize_facts(&[
            "User is allergic to peanuts and I love Italian food.",
            "user loves Italian food",
            "Users name is Priya.",
            "user's bestfriend is Arjun",
            "  ",
            "User works as a nurse",
        ]);
        assert_eq!(
            got,
            facts(&[
                "User is allergic to peanuts",
                "User likes Italian food",
                "User's name is Priya",
                "User's best friend is Arjun",
                "User works as a nurse",
            ])
        );
    }

    #[test]
    fn test_deterministic_reply_name() {
        let h = Heuristics::new();
        let memory = facts(&["User's name is Priya"]);
        assert_eq!(
            h.deterministic_reply("What's my name?", &memory).as_deref(),
            Some("Your name is Priya.")
        );
        assert_eq!(
            h.deterministic_reply("who am i", &[]).as_deref(),
            Some("I do not have your name saved yet.")
        );
        assert_eq!(
            h.deterministic_reply("My name is Priya", &[]).as_deref(),
            Some("Thanks for sharing. I will remember that.")
        );
    }

    #[test]
    fn test_deterministic_reply_latest_name_and_friend_win() {
        let h = Heuristics::new();
        let memory = facts(&[
            "User's name is Priya",
            "User's best friend is Arjun",
            "User's name is Anna",
            "User's best friend is Meera",
        ]);
        assert_eq!(
            h.deterministic_reply("What's my name?", &memory).as_deref(),
            Some("Your name is Anna.")
        );
        assert_eq!(
            h.deterministic_reply("Who is my best friend?", &memory).as_deref(),
            Some("Your best friend is Meera.")
        );
    }

    #[test]
    fn test_deterministic_reply_allergies() {
        let h = Heuristics::new();
        let memory = facts(&["User is allergic to peanuts", "User is allergic to Peanuts"]);
        assert_eq!(
            h.deterministic_reply("What am I allergic to?", &memory).as_deref(),
            Some("You told me you are allergic to peanuts.")
        );
    }

    #[test]
    fn test_deterministic_reply_food_respects_allergy() {
        let h = Heuristics::new();
        let memory = facts(&["User is allergic to peanuts", "User likes hiking", "User likes Italian food"]);
        let reply = h.deterministic_reply("What should I eat for dinner", &memory).unwrap();
        assert!(reply.contains("Italian food"), "{reply}");
        assert!(reply.contains("without peanuts"), "{reply}");
    }

    #[test]
    fn test_deterministic_reply_preferences_food_first() {
        let h = Heuristics::new();
        let memory = facts(&["User likes hiking", "User likes pizza"]);
        assert_eq!(
            h.deterministic_reply("what do I like", &memory).as_deref(),
            Some("You told me you like pizza, hiking.")
        );
    }

    #[test]
    fn test_deterministic_reply_acknowledges_new_facts() {
        let h = Heuristics::new();
        assert_eq!(
            h.deterministic_reply("I'm allergic to peanuts", &[]).as_deref(),
            Some("Thanks for sharing. I will remember that.")
        );
        assert_eq!(h.deterministic_reply("Tell me a joke", &[]), None);
    }

    #[test]
    fn test_fallback_reply() {
        let h = Heuristics::new();
        assert_eq!(
            h.fallback_reply(&facts(&["User likes tea"])),
            "I remember this about you: User likes tea."
        );
        assert!(h.fallback_reply(&[]).starts_with("I can help with that."));
    }
}
