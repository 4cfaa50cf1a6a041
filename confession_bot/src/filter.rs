use regex::Regex;

/// Reply to a submission that tripped the filter.
pub const BANNED_CONTENT_MESSAGE: &str = "⚠️ <b>Your message contains inappropriate language.</b>

Please rewrite your confession without using offensive words or phrases.

Your message was NOT sent to the admins.

📝 <b>Tips:</b>
• Express your feelings respectfully
• Avoid profanity and slurs
• Be mindful of others

Please try again with appropriate language.";

/// Words banned out of the box, used unless a word list file is configured.
const DEFAULT_WORDS: &[&str] = &["fuck", "shit", "bitch", "asshole", "bastard"];

/// Result of [`ContentFilter::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterVerdict {
    pub is_banned: bool,
    pub matched_term: Option<String>,
}

impl FilterVerdict {
    fn clean() -> Self {
        Self {
            is_banned: false,
            matched_term: None,
        }
    }

    fn matched(term: &str) -> Self {
        Self {
            is_banned: true,
            matched_term: Some(term.to_string()),
        }
    }
}

/// Literal banned word/phrase matcher.
///
/// Single words only match as whole words, ignoring case, so a banned word
/// inside a longer innocent word is fine. Phrases (anything with whitespace in
/// it) match anywhere in the text, ignoring case.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    words: Vec<(String, Regex)>,
    phrases: Vec<String>,
}

impl ContentFilter {
    /// Blank terms are dropped, as they would match everything.
    ///
    /// # Errors
    ///
    /// Errors if a word makes for a regex that is too big to compile.
    pub fn new<W, P>(words: W, phrases: P) -> Result<Self, regex::Error>
    where
        W: IntoIterator,
        W::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|word| word.as_ref().trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .map(|word| {
                let regex = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&word)))?;
                Ok((word, regex))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        let phrases = phrases
            .into_iter()
            .map(|phrase| phrase.as_ref().trim().to_lowercase())
            .filter(|phrase| !phrase.is_empty())
            .collect();

        Ok(Self { words, phrases })
    }

    /// Filter with the built-in word list and no phrases.
    pub fn default_list() -> Self {
        Self::new(DEFAULT_WORDS, std::iter::empty::<&str>())
            .expect("Built-in word list will always compile")
    }

    /// Parse a word list file: one term per line, blank lines and lines
    /// starting with `#` are skipped, and a term with whitespace inside is a
    /// phrase.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn from_list(list: &str) -> Result<Self, regex::Error> {
        let (phrases, words): (Vec<&str>, Vec<&str>) = list
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .partition(|term| term.contains(char::is_whitespace));

        Self::new(words, phrases)
    }

    /// Amount of words and phrases in this filter.
    pub fn len(&self) -> usize {
        self.words.len() + self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check the text against the list. The first term that matches, words
    /// first, is reported.
    pub fn check(&self, text: &str) -> FilterVerdict {
        if let Some((word, _)) = self.words.iter().find(|(_, regex)| regex.is_match(text)) {
            return FilterVerdict::matched(word);
        }

        if self.phrases.is_empty() {
            return FilterVerdict::clean();
        }

        let text = text.to_lowercase();
        match self.phrases.iter().find(|phrase| text.contains(phrase.as_str())) {
            Some(phrase) => FilterVerdict::matched(phrase),
            None => FilterVerdict::clean(),
        }
    }
}
