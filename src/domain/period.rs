use chrono::NaiveDate;

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    start: NaiveDate,
    end: NaiveDate,
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Calendar month, `None` for an out-of-range month or year.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            start,
            end: next.pred_opt()?,
        })
    }

    pub fn year(year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Part of `[start, end]` that falls inside this period.
    pub fn intersect(&self, start: NaiveDate, end: NaiveDate) -> Option<Period> {
        Period::new(self.start.max(start), self.end.min(end))
    }

    pub fn len_days(&self) -> u32 {
        (self.end - self.start).num_days() as u32 + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_covers_leap_february() {
        let feb = Period::month(2024, 2).unwrap();
        assert_eq!(feb.start(), date(2024, 2, 1));
        assert_eq!(feb.end(), date(2024, 2, 29));
        assert_eq!(feb.len_days(), 29);
    }

    #[test]
    fn december_rolls_into_next_year() {
        let dec = Period::month(2023, 12).unwrap();
        assert_eq!(dec.end(), date(2023, 12, 31));
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert!(Period::month(2024, 13).is_none());
        assert!(Period::month(2024, 0).is_none());
    }

    #[test]
    fn intersect_clips_to_bounds() {
        let march = Period::month(2024, 3).unwrap();
        let clipped = march.intersect(date(2024, 2, 27), date(2024, 3, 2)).unwrap();
        assert_eq!(clipped.start(), date(2024, 3, 1));
        assert_eq!(clipped.len_days(), 2);
        assert!(march.intersect(date(2024, 4, 1), date(2024, 4, 3)).is_none());
    }

    #[test]
    fn days_iterates_inclusively() {
        let p = Period::new(date(2024, 3, 30), date(2024, 4, 1)).unwrap();
        let days: Vec<_> = p.days().collect();
        assert_eq!(days, vec![date(2024, 3, 30), date(2024, 3, 31), date(2024, 4, 1)]);
    }
}
