//! Fixed-size page slicing shared by every post listing.
//!
//! Requests name a 1-based page. Anything that is not a positive number means
//! the first page, and numbers past the end mean the last one. An empty
//! listing still has a single, empty first page.

use serde::Serialize;
use std::{num::NonZeroU64, str::FromStr};

pub const POSTS_PER_PAGE: NonZeroU64 = NonZeroU64::new(10).unwrap();

/// The page a client asked for, before it is clamped to the listing.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PageRequest(Option<NonZeroU64>);

impl PageRequest {
    #[must_use]
    pub fn first() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn number(number: u64) -> Self {
        Self(NonZeroU64::new(number))
    }

    /// Parses a raw `page` query value, falling back to the first page.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|raw| u64::from_str(raw.trim()).ok())
            .map_or_else(Self::first, Self::number)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct Paginator {
    per_page: NonZeroU64,
}

/// Where a resolved page sits in a listing of `count` items.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub per_page: u64,
}

impl PageWindow {
    #[must_use]
    pub fn offset(self) -> u64 {
        (self.number - 1) * self.per_page
    }

    #[must_use]
    pub fn limit(self) -> u64 {
        self.per_page
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Page<T> {
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub items: Vec<T>,
}

impl Paginator {
    #[must_use]
    pub fn new(per_page: NonZeroU64) -> Self {
        Self { per_page }
    }

    #[must_use]
    pub fn per_page(self) -> u64 {
        self.per_page.get()
    }

    #[must_use]
    pub fn window(self, count: u64, request: PageRequest) -> PageWindow {
        let num_pages = count.div_ceil(self.per_page()).max(1);
        let number = request.0.map_or(1, NonZeroU64::get).min(num_pages);

        PageWindow {
            number,
            num_pages,
            count,
            per_page: self.per_page(),
        }
    }

    /// Slices an already ordered, fully loaded listing.
    #[must_use]
    pub fn paginate<T>(self, items: Vec<T>, request: PageRequest) -> Page<T> {
        let window = self.window(items.len() as u64, request);
        let offset = usize::try_from(window.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(window.limit()).unwrap_or(usize::MAX);

        let items = items.into_iter().skip(offset).take(limit).collect();
        Page::new(window, items)
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(POSTS_PER_PAGE)
    }
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(window: PageWindow, items: Vec<T>) -> Self {
        Self {
            number: window.number,
            num_pages: window.num_pages,
            count: window.count,
            has_next: window.number < window.num_pages,
            has_previous: window.number > 1,
            items,
        }
    }

    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_next: self.has_next,
            has_previous: self.has_previous,
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::pagination::{PageRequest, Paginator};

    #[test]
    fn page_sizes() {
        let paginator = Paginator::default();

        for count in [0_u64, 1, 9, 10, 11, 13, 20, 25, 101] {
            let items: Vec<u64> = (0..count).collect();
            let num_pages = count.div_ceil(10).max(1);

            for number in 1..=num_pages {
                let page = paginator.paginate(items.clone(), PageRequest::number(number));
                let expected = 10.min(count.saturating_sub(10 * (number - 1)));

                assert_eq!(page.number, number);
                assert_eq!(page.num_pages, num_pages);
                assert_eq!(page.items.len() as u64, expected, "{count} items, page {number}");
                assert_eq!(page.items.first(), items.get(((number - 1) * 10) as usize));
            }
        }
    }

    #[test]
    fn thirteen_items_split_ten_and_three() {
        let paginator = Paginator::default();
        let items: Vec<u32> = (0..13).collect();

        let first = paginator.paginate(items.clone(), PageRequest::first());
        assert_eq!(first.items, (0..10).collect::<Vec<_>>());
        assert!(first.has_next);
        assert!(!first.has_previous);

        let second = paginator.paginate(items, PageRequest::number(2));
        assert_eq!(second.items, vec![10, 11, 12]);
        assert!(!second.has_next);
        assert!(second.has_previous);
    }

    #[test]
    fn invalid_requests_fall_back_to_first_page() {
        for raw in [None, Some(""), Some("0"), Some("-1"), Some("abc"), Some("1.5")] {
            assert_eq!(PageRequest::parse(raw), PageRequest::first(), "{raw:?}");
        }
        assert_eq!(PageRequest::parse(Some("2")), PageRequest::number(2));
        assert_eq!(PageRequest::number(0), PageRequest::first());
    }

    #[test]
    fn requests_past_the_end_clamp_to_last_page() {
        let window = Paginator::default().window(13, PageRequest::number(99));
        assert_eq!(window.number, 2);
        assert_eq!(window.offset(), 10);

        let empty = Paginator::default().window(0, PageRequest::number(5));
        assert_eq!((empty.number, empty.num_pages, empty.offset()), (1, 1, 0));
    }
}
