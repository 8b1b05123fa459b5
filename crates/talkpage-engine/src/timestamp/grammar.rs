//! Date format token grammar in MediaWiki syntax.

/// A single date token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateToken {
    /// `d`: day of month, two digits.
    DayPadded,
    /// `j`: day of month.
    Day,
    /// `n`: month number.
    Month,
    /// `m`: month number, two digits.
    MonthPadded,
    /// `Y`: four-digit year.
    Year,
    /// `xkY`: Thai solar year (Gregorian + 543).
    ThaiYear,
    /// `G`: hour.
    Hour,
    /// `H`: hour, two digits.
    HourPadded,
    /// `i`: minutes, two digits.
    Minute,
    /// `D`: abbreviated weekday name.
    WeekdayShort,
    /// `l`: full weekday name.
    Weekday,
    /// `M`: abbreviated month name.
    MonthShort,
    /// `F`: full month name.
    MonthName,
    /// `xg`: genitive month name.
    MonthGenitive,
}

impl DateToken {
    /// Whether the token is rendered with digits.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            Self::WeekdayShort | Self::Weekday | Self::MonthShort | Self::MonthName | Self::MonthGenitive
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatItem {
    Token(DateToken),
    Literal(String),
}

/// Splits a format string into tokens and literal runs.
///
/// `\` makes the next character literal and `"..."` is a verbatim literal.
/// A `"` without a closing quote is itself a literal `"`.
pub fn tokenize(format: &str) -> Vec<FormatItem> {
    let chars: Vec<char> = format.chars().collect();
    let mut items = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    let flush = |literal: &mut String, items: &mut Vec<FormatItem>| {
        if !literal.is_empty() {
            items.push(FormatItem::Literal(std::mem::take(literal)));
        }
    };

    while i < chars.len() {
        let c = chars[i];
        let token = match c {
            'd' => Some((DateToken::DayPadded, 1)),
            'j' => Some((DateToken::Day, 1)),
            'n' => Some((DateToken::Month, 1)),
            'm' => Some((DateToken::MonthPadded, 1)),
            'Y' => Some((DateToken::Year, 1)),
            'G' => Some((DateToken::Hour, 1)),
            'H' => Some((DateToken::HourPadded, 1)),
            'i' => Some((DateToken::Minute, 1)),
            'D' => Some((DateToken::WeekdayShort, 1)),
            'l' => Some((DateToken::Weekday, 1)),
            'M' => Some((DateToken::MonthShort, 1)),
            'F' => Some((DateToken::MonthName, 1)),
            'x' if chars.get(i + 1) == Some(&'g') => Some((DateToken::MonthGenitive, 2)),
            'x' if chars.get(i + 1) == Some(&'k') && chars.get(i + 2) == Some(&'Y') => {
                Some((DateToken::ThaiYear, 3))
            }
            _ => None,
        };

        if let Some((token, width)) = token {
            flush(&mut literal, &mut items);
            items.push(FormatItem::Token(token));
            i += width;
            continue;
        }

        match c {
            '\\' => {
                // A trailing backslash is kept as-is.
                literal.push(chars.get(i + 1).copied().unwrap_or('\\'));
                i += 2;
            }
            '"' => match chars[i + 1..].iter().position(|&q| q == '"') {
                Some(close) => {
                    literal.extend(&chars[i + 1..i + 1 + close]);
                    i += close + 2;
                }
                None => {
                    literal.push('"');
                    i += 1;
                }
            },
            'x' => {
                // Unknown `x` modifiers render their second character literally.
                if let Some(&next) = chars.get(i + 1) {
                    literal.push(next);
                }
                i += 2;
            }
            _ => {
                literal.push(c);
                i += 1;
            }
        }
    }
    flush(&mut literal, &mut items);
    items
}
