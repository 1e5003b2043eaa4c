/// One slash-delimited level of a topic filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FilterLevel {
    Literal(String),
    SingleWildcard,
    MultiWildcard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicError {
    Empty,
    TooLong,
    /// A publish topic name contains `+` or `#`.
    WildcardInTopicName,
    /// `#` used anywhere but as the final filter level.
    NonTerminalMultiWildcard,
}

/// A parsed, validated subscribe pattern: `sport/+/score`, `#`, `$SYS/#`, ...
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter {
    levels: Vec<FilterLevel>,
}

impl TopicFilter {
    pub fn parse(filter: &str) -> Result<Self, TopicError> {
        if filter.is_empty() {
            return Err(TopicError::Empty);
        }
        if filter.len() > u16::MAX as usize {
            return Err(TopicError::TooLong);
        }

        let parts: Vec<&str> = filter.split('/').collect();
        let last = parts.len() - 1;
        let mut levels = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let level = match *part {
                "#" => {
                    if i != last {
                        return Err(TopicError::NonTerminalMultiWildcard);
                    }
                    FilterLevel::MultiWildcard
                }
                "+" => FilterLevel::SingleWildcard,
                _ => FilterLevel::Literal((*part).to_string()),
            };
            levels.push(level);
        }
        Ok(Self { levels })
    }

    /// Whether this filter matches a concrete topic name, per the level-by-level
    /// rules: `+` matches one non-empty level, `#` matches all trailing levels,
    /// and a leading `+`/`#` never matches a topic whose first level starts
    /// with `$` (system topics are invisible to broad wildcards).
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        let topic_levels: Vec<&str> = topic.split('/').collect();

        if matches!(self.levels.first(), Some(FilterLevel::SingleWildcard | FilterLevel::MultiWildcard))
            && topic_levels.first().is_some_and(|l| l.starts_with('$'))
        {
            return false;
        }

        let mut ti = topic_levels.iter();
        for level in &self.levels {
            if let FilterLevel::MultiWildcard = level {
                return true;
            }
            let Some(t) = ti.next() else {
                return false;
            };
            match level {
                FilterLevel::Literal(s) => {
                    if s != t {
                        return false;
                    }
                }
                FilterLevel::SingleWildcard => {
                    if t.is_empty() {
                        return false;
                    }
                }
                FilterLevel::MultiWildcard => unreachable!(),
            }
        }
        ti.next().is_none()
    }
}

/// Validate a concrete publish topic name: non-empty, no wildcard characters.
pub fn validate_topic_name(name: &str) -> Result<(), TopicError> {
    if name.is_empty() {
        return Err(TopicError::Empty);
    }
    if name.len() > u16::MAX as usize {
        return Err(TopicError::TooLong);
    }
    if name.contains('+') || name.contains('#') {
        return Err(TopicError::WildcardInTopicName);
    }
    Ok(())
}
