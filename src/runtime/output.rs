//! Program output: `Print`, `PutChars` and the string-print statement.
//!
//! Output goes through an [`OutputSink`] so hosts can redirect it; the REPL and
//! CLI write to stdout, tests capture into a [`CaptureSink`].

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

/// Destination of program output.
pub trait OutputSink: Send + Sync {
    fn write_str(
        &self,
        text: &str,
    );

    fn flush(&self) {}
}

/// Writes to the process's stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_str(
        &self,
        text: &str,
    ) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

/// Collects output in memory.
#[derive(Debug, Default, Clone)]
pub struct CaptureSink {
    buffer: Arc<Mutex<String>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }

    /// Drain the buffer.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buffer.lock())
    }
}

impl OutputSink for CaptureSink {
    fn write_str(
        &self,
        text: &str,
    ) {
        self.buffer.lock().push_str(text);
    }
}

/// Characters packed into an integer, low byte first, stopping at the first NUL.
///
/// `PutChars('AB')` and `%c` print multi-character constants this way.
pub fn packed_chars(value: i64) -> String {
    value
        .to_le_bytes()
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

/// Widest field a conversion pads to; larger widths are clamped.
pub const MAX_WIDTH: usize = 4096;

#[derive(Debug, Default)]
struct Conversion {
    left: bool,
    zero: bool,
    width: usize,
}

impl Conversion {
    fn pad(
        &self,
        body: String,
        out: &mut String,
    ) {
        let len = body.chars().count();
        if len >= self.width {
            out.push_str(&body);
            return;
        }
        let fill = self.width - len;
        if self.left {
            out.push_str(&body);
            out.extend(std::iter::repeat(' ').take(fill));
        } else if self.zero {
            let (sign, digits) = match body.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("", body.as_str()),
            };
            out.push_str(sign);
            out.extend(std::iter::repeat('0').take(fill));
            out.push_str(digits);
        } else {
            out.extend(std::iter::repeat(' ').take(fill));
            out.push_str(&body);
        }
    }
}

/// Expand a HolyC format string.
///
/// Supports `%d %i %u %x %X %c %s %%` with the `-` and `0` flags and a decimal
/// width of at most [`MAX_WIDTH`]. Missing arguments read as zero. `%s` arguments are resolved through
/// `string_at`; an unresolvable one prints `(null)`. Unknown conversions are
/// copied through verbatim.
pub fn format_holyc(
    format: &str,
    args: &[i64],
    mut string_at: impl FnMut(i64) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter().copied();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut conv = Conversion::default();
        let mut raw = String::from("%");
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => conv.left = true,
                '0' => conv.zero = true,
                _ => break,
            }
            raw.push(flag);
            chars.next();
        }
        while let Some(&digit) = chars.peek() {
            let Some(value) = digit.to_digit(10) else {
                break;
            };
            conv.width = conv
                .width
                .saturating_mul(10)
                .saturating_add(value as usize)
                .min(MAX_WIDTH);
            raw.push(digit);
            chars.next();
        }

        let Some(conversion) = chars.next() else {
            out.push_str(&raw);
            break;
        };
        let body = match conversion {
            '%' => {
                out.push('%');
                continue;
            }
            'd' | 'i' => args.next().unwrap_or(0).to_string(),
            'u' => (args.next().unwrap_or(0) as u64).to_string(),
            'x' => format!("{:x}", args.next().unwrap_or(0)),
            'X' => format!("{:X}", args.next().unwrap_or(0)),
            'c' => packed_chars(args.next().unwrap_or(0)),
            's' => {
                string_at(args.next().unwrap_or(0)).unwrap_or_else(|| "(null)".to_string())
            }
            other => {
                out.push_str(&raw);
                out.push(other);
                continue;
            }
        };
        conv.pad(body, &mut out);
    }

    out
}
