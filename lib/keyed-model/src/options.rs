//! Per-call options.
//!
//! Validation is on unless switched off. Switching it off hands correctness
//! of the payload to the caller. The transaction handle is forwarded to the
//! table client as-is.

use crate::Order;

pub struct FindOptions<'a, T> {
    pub validate: bool,
    pub order_by: Vec<(String, Order)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub transaction: Option<&'a mut T>,
}

impl<T> Default for FindOptions<'_, T> {
    fn default() -> Self {
        Self {
            validate: true,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            transaction: None,
        }
    }
}

impl<'a, T> FindOptions<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order_by.push((field.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn transaction(mut self, tx: &'a mut T) -> Self {
        self.transaction = Some(tx);
        self
    }
}

pub struct CreateOptions<'a, T> {
    pub validate: bool,
    pub transaction: Option<&'a mut T>,
}

impl<T> Default for CreateOptions<'_, T> {
    fn default() -> Self {
        Self {
            validate: true,
            transaction: None,
        }
    }
}

impl<'a, T> CreateOptions<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    pub fn transaction(mut self, tx: &'a mut T) -> Self {
        self.transaction = Some(tx);
        self
    }
}

/// Options for updates; the filter and the values are validated
/// independently.
pub struct UpdateOptions<'a, T> {
    pub validate_query: bool,
    pub validate_values: bool,
    pub transaction: Option<&'a mut T>,
}

impl<T> Default for UpdateOptions<'_, T> {
    fn default() -> Self {
        Self {
            validate_query: true,
            validate_values: true,
            transaction: None,
        }
    }
}

impl<'a, T> UpdateOptions<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_query_validation(mut self) -> Self {
        self.validate_query = false;
        self
    }

    pub fn without_values_validation(mut self) -> Self {
        self.validate_values = false;
        self
    }

    pub fn transaction(mut self, tx: &'a mut T) -> Self {
        self.transaction = Some(tx);
        self
    }
}

pub struct DestroyOptions<'a, T> {
    pub validate: bool,
    pub transaction: Option<&'a mut T>,
}

impl<T> Default for DestroyOptions<'_, T> {
    fn default() -> Self {
        Self {
            validate: true,
            transaction: None,
        }
    }
}

impl<'a, T> DestroyOptions<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    pub fn transaction(mut self, tx: &'a mut T) -> Self {
        self.transaction = Some(tx);
        self
    }
}
