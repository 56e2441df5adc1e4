//! Transport cookie description.
//!
//! The session store does not touch HTTP. A web layer asks the manager for a
//! [`SessionCookie`] after starting a session and writes it to the response.

/// Cookie SameSite attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// Sent only on same-site requests
    Strict,
    /// Also sent on top-level cross-site navigations
    Lax,
    /// Sent on all requests; browsers require `Secure`
    None,
}

impl SameSite {
    /// Attribute value as written in a `Set-Cookie` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Cookie carrying the session ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Cookie name (the session name)
    pub name: String,
    /// Cookie value (the session ID)
    pub value: String,
    /// Cookie path
    pub path: String,
    /// Max-Age in seconds
    pub max_age: u64,
    /// Secure flag (HTTPS only)
    pub secure: bool,
    /// HttpOnly flag
    pub http_only: bool,
    /// SameSite policy
    pub same_site: SameSite,
}

impl SessionCookie {
    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut header = format!(
            "{}={}; Path={}; Max-Age={}",
            self.name, self.value, self.path, self.max_age
        );

        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        header.push_str(&format!("; SameSite={}", self.same_site.as_str()));

        header
    }
}
