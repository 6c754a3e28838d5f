//! Stream and filter slug handling.
//!
//! A stream slug has four dash-separated segments:
//! `s--<projectId>--<deviceId>--<variableId>`. The matching filter slug
//! replaces the prefix with `f`; a project-wide filter blanks the device
//! segment: `f--<projectId>----<variableId>`.

/// The four segments of a stream or filter slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugParts {
    pub prefix: String,
    pub project: String,
    pub device: String,
    pub variable: String,
}

impl SlugParts {
    /// Splits a slug into its segments. Returns `None` unless there are
    /// exactly four.
    ///
    /// # Examples
    ///
    /// ```
    /// use streamgate_common::slug::SlugParts;
    ///
    /// let parts = SlugParts::parse("s--0000-0001--0000-0000-0000-0002--0003").unwrap();
    /// assert_eq!(parts.prefix, "s");
    /// assert_eq!(parts.project, "0000-0001");
    /// assert_eq!(parts.variable, "0003");
    /// assert!(SlugParts::parse("not-a-slug").is_none());
    /// ```
    pub fn parse(slug: &str) -> Option<SlugParts> {
        let elements: Vec<&str> = slug.split("--").collect();
        if elements.len() != 4 {
            return None;
        }
        Some(SlugParts {
            prefix: elements[0].to_string(),
            project: elements[1].to_string(),
            device: elements[2].to_string(),
            variable: elements[3].to_string(),
        })
    }

    /// True for project-wide slugs, which have a blank device segment.
    pub fn is_project_wide(&self) -> bool {
        self.device.is_empty()
    }

    /// The stream-specific filter slug: same segments, `f` prefix.
    pub fn stream_filter_slug(&self) -> String {
        format!("f--{}--{}--{}", self.project, self.device, self.variable)
    }

    /// The project-wide filter slug: `f` prefix, blank device segment.
    pub fn project_filter_slug(&self) -> String {
        format!("f--{}----{}", self.project, self.variable)
    }

    /// The stream slug covered by this filter slug, with the device
    /// segment wildcarded for project-wide filters. Used to bulk-clear
    /// current-state entries when a filter is reset.
    pub fn current_state_pattern(&self) -> String {
        if self.device.is_empty() {
            format!("s--{}--*--{}", self.project, self.variable)
        } else {
            format!("s--{}--{}--{}", self.project, self.device, self.variable)
        }
    }
}

/// Normalizes a state label to its slug form: lowercased, with runs of
/// whitespace and underscores collapsed to single dashes.
///
/// # Examples
///
/// ```
/// use streamgate_common::slug::slugify;
///
/// assert_eq!(slugify("Too Hot"), "too-hot");
/// assert_eq!(slugify("state1"), "state1");
/// ```
pub fn slugify(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut last_dash = false;
    for c in label.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
