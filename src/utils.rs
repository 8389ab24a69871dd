use std::fmt;
use std::io::{self, BufRead, Write};

use crate::error::EncodingError;
use crate::{PASSWORD_LEN, USERNAME_LEN};

/// Username and password as typed by the user, checked against the
/// protocol's field widths. The password never leaves the process.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    password: String,
}

impl Credential {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, EncodingError> {
        let username = username.into();
        let password = password.into();

        if username.is_empty() {
            return Err(EncodingError::EmptyUsername);
        }
        if username.len() > USERNAME_LEN {
            return Err(EncodingError::UsernameTooLong { len: username.len(), max: USERNAME_LEN });
        }
        if username.contains('\0') {
            return Err(EncodingError::UsernameContainsNul);
        }
        if password.is_empty() {
            return Err(EncodingError::EmptyPassword);
        }
        if password.len() > PASSWORD_LEN {
            return Err(EncodingError::PasswordTooLong { len: password.len(), max: PASSWORD_LEN });
        }

        Ok(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Prints `prompt` and reads one trimmed line from `input`.
pub fn prompt_line<R: BufRead>(input: &mut R, prompt: &str) -> io::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no input"));
    }
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_credential_bounds() {
        assert!(Credential::new("alice", "secret").is_ok());
        assert!(Credential::new("a".repeat(16), "p".repeat(16)).is_ok());
        assert_eq!(
            Credential::new("a".repeat(17), "secret"),
            Err(EncodingError::UsernameTooLong { len: 17, max: 16 })
        );
        assert_eq!(
            Credential::new("alice", "p".repeat(17)),
            Err(EncodingError::PasswordTooLong { len: 17, max: 16 })
        );
        assert_eq!(Credential::new("", "secret"), Err(EncodingError::EmptyUsername));
        assert_eq!(Credential::new("alice", ""), Err(EncodingError::EmptyPassword));
    }

    #[test]
    fn test_credential_debug_hides_password() {
        let credential = Credential::new("alice", "hunter2").unwrap();
        let shown = format!("{:?}", credential);
        assert!(shown.contains("alice"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_prompt_line_trims() {
        let mut input = Cursor::new("  bob \nrest\n");
        assert_eq!(prompt_line(&mut input, "Username: ").unwrap(), "bob");
    }

    #[test]
    fn test_prompt_line_eof() {
        let mut input = Cursor::new("");
        let err = prompt_line(&mut input, "Username: ").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
