//! Form validation. Each check returns the field-keyed messages shown next
//! to the inputs when a form is re-rendered.

use std::collections::BTreeMap;

pub const TITLE_MAX_CHARS: usize = 50;
pub const POST_CONTENT_MAX_CHARS: usize = 500;
pub const COMMENT_MAX_CHARS: usize = 500;
pub const MAX_CATEGORIES: usize = 3;
pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 50;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 30;
pub const SEARCH_MAX_LEN: usize = 50;
pub const IMAGE_MAX_BYTES: usize = 20 << 20;

pub const IMAGE_EXTENSIONS: &[&str] = &[".jpeg", ".jpg", ".png", ".svg", ".gif"];

/// Field name to message. Ordered so rendering is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<&'static str, String>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later messages for the same field replace earlier ones.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Metadata of an uploaded image, checked before the bytes are stored.
#[derive(Debug, Clone)]
pub struct ImageMeta<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub size: usize,
}

pub fn validate_post(
    title: &str,
    content: &str,
    categories: &[String],
    image: Option<&ImageMeta<'_>>,
) -> FormErrors {
    let mut errors = FormErrors::new();

    let title = title.trim();
    if title.is_empty() {
        errors.add("title", "Title is required");
    } else if title.chars().count() > TITLE_MAX_CHARS {
        errors.add("title", "Title must not exceed 50 characters");
    }

    let content = content.trim();
    if content.is_empty() {
        errors.add("content", "Content is required");
    } else if content.chars().count() > POST_CONTENT_MAX_CHARS {
        // Longstanding wording; the enforced limit is POST_CONTENT_MAX_CHARS.
        errors.add("content", "Must not exceed 1000 characters");
    }

    if categories.is_empty() || categories.len() > MAX_CATEGORIES {
        errors.add("categories", "Please select between 1 and 3 categories");
    }

    if let Some(image) = image {
        if !image.content_type.starts_with("image/") {
            errors.add("image", "Only image files are supported");
        } else if !has_image_extension(image.file_name) {
            errors.add(
                "image",
                "Only JPEG, PNG, SVG, and GIF file formats are supported",
            );
        }
        if image.size > IMAGE_MAX_BYTES {
            errors.add("image", "file size should not exceed 20MB");
        }
    }

    errors
}

/// Lowercased extension including the dot, e.g. `.png`.
pub fn extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

fn has_image_extension(file_name: &str) -> bool {
    extension(file_name)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn validate_comment(comment: &str) -> FormErrors {
    let mut errors = FormErrors::new();
    let comment = comment.trim();
    if comment.is_empty() {
        errors.add("comment", "Comment can't be empty");
    } else if comment.chars().count() > COMMENT_MAX_CHARS {
        errors.add("comment", "Must not exceed 500 characters");
    }
    errors
}

/// Format checks for the signup form. Uniqueness needs the store and is
/// checked by the caller.
pub fn validate_signup(name: &str, email: &str, password: &str) -> FormErrors {
    let mut errors = FormErrors::new();

    let name = name.trim();
    let name_len = name.chars().count();
    if name.is_empty() {
        errors.add("name", "Name is required");
    } else if name_len < NAME_MIN_CHARS {
        errors.add("name", "Name must be at least 2 characters long");
    } else if name_len > NAME_MAX_CHARS {
        errors.add("name", "Name must be max 50 characters");
    } else if !name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        errors.add(
            "name",
            "Name can only contain letters, numbers, and hyphens (-)",
        );
    }

    check_email(&mut errors, email);

    let password = password.trim();
    if password.is_empty() {
        errors.add("password", "Password is required");
    } else if !is_strong_password(password) {
        errors.add(
            "password",
            "Password must contain at least 6 characters, including at least one uppercase letter, \
             one lowercase letter, one number, and one special character.",
        );
    }

    errors
}

pub fn validate_login(email: &str, password: &str) -> FormErrors {
    let mut errors = FormErrors::new();
    check_email(&mut errors, email);
    if password.trim().is_empty() {
        errors.add("password", "Password is required");
    }
    errors
}

pub fn validate_search(key: &str) -> FormErrors {
    let mut errors = FormErrors::new();
    if key.len() > SEARCH_MAX_LEN {
        errors.add("search", "Search string should be at most 50 characters");
    }
    errors
}

fn check_email(errors: &mut FormErrors, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if email.len() > EMAIL_MAX_LEN || !is_valid_email(email) {
        errors.add("email", "Invalid Email Address");
    }
}

/// Byte length 6 to 30, with an uppercase letter, a lowercase letter, a
/// digit, and a punctuation or symbol character.
pub fn is_strong_password(password: &str) -> bool {
    let len_ok = (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&password.len());
    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    let has_digit = password.chars().any(char::is_numeric);
    let has_special = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace() && !c.is_control());
    len_ok && has_upper && has_lower && has_digit && has_special
}

/// `local@domain` where the local part uses the RFC 5322 atom characters and
/// dots, and the domain is dot-separated labels of 1 to 63 ASCII
/// alphanumerics or inner hyphens.
pub fn is_valid_email(email: &str) -> bool {
    const LOCAL_SPECIALS: &str = ".!#$%&'*+/=?^_`{|}~-";

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || LOCAL_SPECIALS.contains(c));

    local_ok && domain.split('.').all(is_domain_label)
}

fn is_domain_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= 63
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("cat{i}")).collect()
    }

    #[test]
    fn valid_post_has_no_errors() {
        assert!(validate_post("Hello", "World", &cats(1), None).is_empty());
    }

    #[test]
    fn title_boundary_is_fifty_characters() {
        let fifty = "é".repeat(50);
        assert!(!validate_post(&fifty, "x", &cats(1), None).has("title"));

        let fifty_one = "a".repeat(51);
        let errors = validate_post(&fifty_one, "x", &cats(1), None);
        assert_eq!(errors.get("title"), Some("Title must not exceed 50 characters"));
    }

    #[test]
    fn blank_fields_are_required() {
        let errors = validate_post("   ", "\n\t", &cats(0), None);
        assert_eq!(errors.get("title"), Some("Title is required"));
        assert_eq!(errors.get("content"), Some("Content is required"));
        assert_eq!(
            errors.get("categories"),
            Some("Please select between 1 and 3 categories")
        );
    }

    #[test]
    fn post_content_limit_keeps_old_message() {
        assert!(!validate_post("t", &"a".repeat(500), &cats(1), None).has("content"));
        let errors = validate_post("t", &"a".repeat(501), &cats(1), None);
        assert_eq!(errors.get("content"), Some("Must not exceed 1000 characters"));
    }

    #[test]
    fn category_count_between_one_and_three() {
        assert!(!validate_post("t", "c", &cats(3), None).has("categories"));
        assert!(validate_post("t", "c", &cats(4), None).has("categories"));
    }

    #[test]
    fn image_checks_type_extension_and_size() {
        let ok = ImageMeta {
            file_name: "cat.PNG",
            content_type: "image/png",
            size: 1024,
        };
        assert!(validate_post("t", "c", &cats(1), Some(&ok)).is_empty());

        let not_image = ImageMeta {
            content_type: "text/plain",
            ..ok.clone()
        };
        assert_eq!(
            validate_post("t", "c", &cats(1), Some(&not_image)).get("image"),
            Some("Only image files are supported")
        );

        let bmp = ImageMeta {
            file_name: "cat.bmp",
            content_type: "image/bmp",
            ..ok.clone()
        };
        assert_eq!(
            validate_post("t", "c", &cats(1), Some(&bmp)).get("image"),
            Some("Only JPEG, PNG, SVG, and GIF file formats are supported")
        );

        let at_limit = ImageMeta {
            size: IMAGE_MAX_BYTES,
            ..ok.clone()
        };
        assert!(validate_post("t", "c", &cats(1), Some(&at_limit)).is_empty());

        let huge = ImageMeta {
            size: IMAGE_MAX_BYTES + 1,
            ..ok
        };
        assert_eq!(
            validate_post("t", "c", &cats(1), Some(&huge)).get("image"),
            Some("file size should not exceed 20MB")
        );
    }

    #[test]
    fn extension_is_lowercased_with_dot() {
        assert_eq!(extension("a.JPEG").as_deref(), Some(".jpeg"));
        assert_eq!(extension("archive.tar.gz").as_deref(), Some(".gz"));
        assert_eq!(extension("noext"), None);
        assert_eq!(extension("trailing."), None);
    }

    #[test]
    fn comment_boundary_is_five_hundred() {
        assert!(validate_comment(&"a".repeat(500)).is_empty());
        assert_eq!(
            validate_comment(&"a".repeat(501)).get("comment"),
            Some("Must not exceed 500 characters")
        );
        assert_eq!(
            validate_comment("  ").get("comment"),
            Some("Comment can't be empty")
        );
    }

    #[test]
    fn signup_accepts_good_input() {
        assert!(validate_signup("jane-doe", "jane@example.com", "Secret1!").is_empty());
    }

    #[test]
    fn signup_name_rules() {
        let msg = |name: &str| {
            validate_signup(name, "a@b.co", "Secret1!")
                .get("name")
                .map(str::to_string)
        };
        assert_eq!(msg("").as_deref(), Some("Name is required"));
        assert_eq!(
            msg("j").as_deref(),
            Some("Name must be at least 2 characters long")
        );
        assert_eq!(
            msg(&"j".repeat(51)).as_deref(),
            Some("Name must be max 50 characters")
        );
        assert_eq!(
            msg("jane doe").as_deref(),
            Some("Name can only contain letters, numbers, and hyphens (-)")
        );
        assert_eq!(msg("Jöns-2"), None);
    }

    #[test]
    fn signup_password_rules() {
        let bad = |pw: &str| validate_signup("jane", "a@b.co", pw).has("password");
        assert!(bad(""));
        assert!(bad("Se1!"));
        assert!(bad("secret1!"));
        assert!(bad("SECRET1!"));
        assert!(bad("Secret!!"));
        assert!(bad("Secret11"));
        assert!(bad(&format!("Secret1!{}", "a".repeat(23))));
        assert!(!bad("Sec1!a"));
        assert!(!bad("Secret1+"));
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("jane@example.com"));
        assert!(is_valid_email("j.o+tag@sub.example-site.org"));
        assert!(is_valid_email("x@localhost"));
        assert!(!is_valid_email("jane"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("jane@"));
        assert!(!is_valid_email("jane@-example.com"));
        assert!(!is_valid_email("jane@example-.com"));
        assert!(!is_valid_email("jane@example..com"));
        assert!(!is_valid_email("jane@exa_mple.com"));
        assert!(!is_valid_email("ja ne@example.com"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email(&format!("a@{}.com", "x".repeat(64))));
    }

    #[test]
    fn overlong_email_is_invalid() {
        let email = format!("{}@example.com", "a".repeat(250));
        assert_eq!(
            validate_login(&email, "pw").get("email"),
            Some("Invalid Email Address")
        );
    }

    #[test]
    fn login_requires_password() {
        let errors = validate_login("jane@example.com", " ");
        assert_eq!(errors.get("password"), Some("Password is required"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn search_key_limit() {
        assert!(validate_search(&"a".repeat(50)).is_empty());
        assert_eq!(
            validate_search(&"a".repeat(51)).get("search"),
            Some("Search string should be at most 50 characters")
        );
    }
}
