pub mod debounce;

use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericField {
    Price,
    Discount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterFlag {
    Discounted,
}

impl FilterFlag {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "discounted" | "discount" => Some(Self::Discounted),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Discounted => "discounted",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    PriceAsc,
    PriceDesc,
    DiscountDesc,
    Unsorted,
}

impl SortKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "name" => Some(Self::Name),
            "price-asc" | "priceasc" | "price" => Some(Self::PriceAsc),
            "price-desc" | "pricedesc" => Some(Self::PriceDesc),
            "discount-desc" | "discountdesc" => Some(Self::DiscountDesc),
            "none" | "default" => Some(Self::Unsorted),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::PriceAsc => "price-asc",
            Self::PriceDesc => "price-desc",
            Self::DiscountDesc => "discount-desc",
            Self::Unsorted => "none",
        }
    }
}

/// Record shape the query engine understands. Search fields are matched
/// case-insensitively; ids are matched as literal substrings.
pub trait Queryable {
    fn id(&self) -> &str;
    fn display_name(&self) -> String;
    fn search_fields(&self) -> Vec<&str>;
    fn numeric_field(&self, field: NumericField) -> Option<f64>;

    fn filter_flag(&self, flag: FilterFlag) -> bool {
        let _ = flag;
        false
    }
}

impl<T: Queryable> Queryable for &T {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn display_name(&self) -> String {
        (**self).display_name()
    }

    fn search_fields(&self) -> Vec<&str> {
        (**self).search_fields()
    }

    fn numeric_field(&self, field: NumericField) -> Option<f64> {
        (**self).numeric_field(field)
    }

    fn filter_flag(&self, flag: FilterFlag) -> bool {
        (**self).filter_flag(flag)
    }
}

#[derive(Clone, Debug, Default)]
pub struct QueryState {
    pub search: String,
    pub sort: SortKey,
    pub filters: HashSet<FilterFlag>,
}

impl QueryState {
    pub fn is_default(&self) -> bool {
        self.search.is_empty() && self.sort == SortKey::default() && self.filters.is_empty()
    }
}

/// Derives the filtered/sorted view from a record slice. Pure: the input is
/// never reordered or mutated, the view borrows from it.
pub fn apply_query<'a, T: Queryable>(records: &'a [T], state: &QueryState) -> Vec<&'a T> {
    let term = state.search.as_str();
    let term_lower = term.to_lowercase();

    let mut view: Vec<&T> = records
        .iter()
        .filter(|r| matches_search(r, term, &term_lower))
        .filter(|r| state.filters.iter().all(|flag| r.filter_flag(*flag)))
        .collect();

    sort_view(&mut view, state.sort);
    view
}

fn matches_search<T: Queryable>(record: &T, term: &str, term_lower: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    if record.id().contains(term) {
        return true;
    }
    record
        .search_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(term_lower))
}

fn sort_view<T: Queryable>(view: &mut [&T], key: SortKey) {
    match key {
        SortKey::Name => view.sort_by_cached_key(|r| r.display_name().to_lowercase()),
        SortKey::PriceAsc => sort_numeric(view, NumericField::Price, false),
        SortKey::PriceDesc => sort_numeric(view, NumericField::Price, true),
        SortKey::DiscountDesc => sort_numeric(view, NumericField::Discount, true),
        SortKey::Unsorted => {}
    }
}

// Records that do not carry the field compare as 0 and keep their relative
// order through sort stability.
fn sort_numeric<T: Queryable>(view: &mut [&T], field: NumericField, descending: bool) {
    view.sort_by(|a, b| {
        let av = a.numeric_field(field).unwrap_or(0.0);
        let bv = b.numeric_field(field).unwrap_or(0.0);
        let ord = av.partial_cmp(&bv).unwrap_or(Ordering::Equal);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}
