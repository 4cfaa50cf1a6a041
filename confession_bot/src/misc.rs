use teloxide::types::User;

/// Tries to print the user in the prettiest way possible, with either
/// `@username` or full name. Optionally allows including user ID.
#[must_use]
pub fn user_name_prettyprint(user: &User, with_id: bool) -> String {
    let mut name = if let Some(username) = &user.username {
        format!("@{username}")
    } else {
        user.full_name()
    };

    if with_id {
        use std::fmt::Write;
        write!(name, " (userid {})", user.id).expect("Writing to a String never fails");
    }

    name
}

#[cfg(test)]
mod tests {
    use teloxide::types::UserId;

    use super::*;

    fn user(username: Option<&str>) -> User {
        User {
            id: UserId(1366743555),
            is_bot: false,
            first_name: "Arch".to_string(),
            last_name: Some("Itector".to_string()),
            username: username.map(str::to_string),
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn prettyprint() {
        assert_eq!(user_name_prettyprint(&user(Some("some_mod")), false), "@some_mod");
        assert_eq!(user_name_prettyprint(&user(None), false), "Arch Itector");
        assert_eq!(
            user_name_prettyprint(&user(None), true),
            "Arch Itector (userid 1366743555)"
        );
    }
}
