use teloxide::types::{Message, PhotoSize};

pub trait MessageStuff {
    /// Text of the message, or its caption if it's a media message.
    fn text_full(&self) -> Option<&str>;
    /// Biggest available size of the photo in this message, if any.
    fn find_biggest_photo(&self) -> Option<&PhotoSize>;
    /// True if the message text looks like a `/command`.
    fn is_command(&self) -> bool;
}

impl MessageStuff for Message {
    fn text_full(&self) -> Option<&str> {
        self.text().or_else(|| self.caption())
    }
    fn find_biggest_photo(&self) -> Option<&PhotoSize> {
        self.photo()?.iter().max_by_key(|x| x.width + x.height)
    }
    fn is_command(&self) -> bool {
        self.text().is_some_and(|text| text.starts_with('/'))
    }
}
