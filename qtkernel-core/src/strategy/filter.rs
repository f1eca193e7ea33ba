//! Gating filters for the signal generators.
//!
//! A filter set is four boolean series in positional order
//! `(long_open, long_stop, short_open, short_stop)`. An open filter that is
//! false disables opening on that side; a stop filter that is true forces the
//! position on that side back to the close signal.

use crate::error::{check_len, KernelError};

/// Borrowed filter series, one flag per bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyFilter<'a> {
    pub long_open: &'a [bool],
    pub long_stop: &'a [bool],
    pub short_open: &'a [bool],
    pub short_stop: &'a [bool],
}

impl<'a> StrategyFilter<'a> {
    pub fn new(
        long_open: &'a [bool],
        long_stop: &'a [bool],
        short_open: &'a [bool],
        short_stop: &'a [bool],
    ) -> Self {
        Self {
            long_open,
            long_stop,
            short_open,
            short_stop,
        }
    }

    /// Build from a positional list. Anything other than four series is rejected.
    pub fn from_slices(series: &[&'a [bool]]) -> Result<Self, KernelError> {
        match series {
            [long_open, long_stop, short_open, short_stop] => {
                Ok(Self::new(long_open, long_stop, short_open, short_stop))
            }
            _ => Err(KernelError::FilterArity(series.len())),
        }
    }

    /// Swap the long and short roles.
    pub fn reversed(self) -> Self {
        Self {
            long_open: self.short_open,
            long_stop: self.short_stop,
            short_open: self.long_open,
            short_stop: self.long_stop,
        }
    }

    pub fn check_len(&self, expected: usize) -> Result<(), KernelError> {
        check_len("long_open", expected, self.long_open.len())?;
        check_len("long_stop", expected, self.long_stop.len())?;
        check_len("short_open", expected, self.short_open.len())?;
        check_len("short_stop", expected, self.short_stop.len())
    }

    pub fn at(&self, i: usize) -> FilterFlags {
        FilterFlags {
            long_open: self.long_open[i],
            long_stop: self.long_stop[i],
            short_open: self.short_open[i],
            short_stop: self.short_stop[i],
        }
    }
}

/// The four filter values for a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterFlags {
    pub long_open: bool,
    pub long_stop: bool,
    pub short_open: bool,
    pub short_stop: bool,
}

impl Default for FilterFlags {
    /// No gating: opens always allowed, stops never triggered.
    fn default() -> Self {
        Self {
            long_open: true,
            long_stop: false,
            short_open: true,
            short_stop: false,
        }
    }
}

/// Resolve an optional filter set for a generator run: validate lengths and
/// apply the long/short swap for reversed strategies.
pub(crate) fn prepare<'a>(
    filter: Option<&StrategyFilter<'a>>,
    len: usize,
    rev: bool,
) -> Result<Option<StrategyFilter<'a>>, KernelError> {
    match filter {
        Some(f) => {
            f.check_len(len)?;
            Ok(Some(if rev { f.reversed() } else { *f }))
        }
        None => Ok(None),
    }
}

pub(crate) fn flags_at(filter: Option<&StrategyFilter<'_>>, i: usize) -> FilterFlags {
    filter.map(|f| f.at(i)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slices_requires_four_series() {
        let a = [true, false];
        let err = StrategyFilter::from_slices(&[&a, &a, &a]).unwrap_err();
        assert_eq!(err, KernelError::FilterArity(3));
        assert!(StrategyFilter::from_slices(&[&a, &a, &a, &a]).is_ok());
    }

    #[test]
    fn reversed_swaps_roles() {
        let lo = [true];
        let ls = [false];
        let so = [false];
        let ss = [true];
        let f = StrategyFilter::new(&lo, &ls, &so, &ss).reversed();
        assert_eq!(
            f.at(0),
            FilterFlags {
                long_open: false,
                long_stop: true,
                short_open: true,
                short_stop: false,
            }
        );
    }

    #[test]
    fn length_mismatch_names_series() {
        let ok = [true, true];
        let short = [false];
        let f = StrategyFilter::new(&ok, &ok, &short, &ok);
        let err = f.check_len(2).unwrap_err();
        assert!(matches!(
            err,
            KernelError::LengthMismatch {
                name: "short_open",
                ..
            }
        ));
    }

    #[test]
    fn missing_filter_is_permissive() {
        let flags = flags_at(None, 10);
        assert!(flags.long_open && flags.short_open);
        assert!(!flags.long_stop && !flags.short_stop);
    }
}
