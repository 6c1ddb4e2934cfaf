use sails_rs::collections::HashMap;
use sails_rs::prelude::*;

use safex_common::{BookId, ExchangeError, TokenId};

use crate::book::Orderbook;

/// Pair record returned by enumeration views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub struct PairInfo {
    pub id: BookId,
    pub base: TokenId,
    pub quote: TokenId,
}

/// Append-only registry of orderbooks. Ids are stable; `(A, B)` and
/// `(B, A)` are distinct pairs and books are never destroyed.
#[derive(Default)]
pub struct Registry {
    books: Vec<Orderbook>,
    ids: HashMap<(TokenId, TokenId), BookId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct the book for a new pair. Fails on an already-mapped pair;
    /// idempotent pair registration lives on the engine.
    pub fn create(
        &mut self,
        engine: ActorId,
        base: TokenId,
        quote: TokenId,
        base_decimals: u8,
        quote_decimals: u8,
    ) -> Result<BookId, ExchangeError> {
        if self.ids.contains_key(&(base, quote)) {
            return Err(ExchangeError::PairExists { base, quote });
        }
        let id = self.books.len() as BookId;
        let book = Orderbook::new(id, engine, base, quote, base_decimals, quote_decimals)?;
        self.books.push(book);
        self.ids.insert((base, quote), id);
        Ok(id)
    }

    pub fn get(&self, base: TokenId, quote: TokenId) -> Option<BookId> {
        self.ids.get(&(base, quote)).copied()
    }

    pub fn get_by_id(&self, id: BookId) -> Option<&Orderbook> {
        self.books.get(id as usize)
    }

    pub fn book_mut(&mut self, id: BookId) -> Option<&mut Orderbook> {
        self.books.get_mut(id as usize)
    }

    /// Pair records for ids in `start..end`, clamped to the registered
    /// range.
    pub fn enumerate(&self, start: BookId, end: BookId) -> Vec<PairInfo> {
        let end = (end as usize).min(self.books.len());
        let start = (start as usize).min(end);
        self.books[start..end]
            .iter()
            .map(|b| PairInfo {
                id: b.id(),
                base: b.base(),
                quote: b.quote(),
            })
            .collect()
    }

    pub fn len(&self) -> u32 {
        self.books.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
