use crate::info::CardInfo;
use crate::native::Selector;
use crate::{Context, Result};

impl Context {
    /// Looks up the card with index `index`. Returns `Ok(None)` if there is none.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the request fails for another reason.
    pub fn card_info_by_index(&self, index: u32) -> Result<Option<CardInfo>> {
        self.card_info(Selector::Index(index))
    }

    /// Looks up the card called `name`. Returns `Ok(None)` if there is none.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the request fails for another reason.
    pub fn card_info_by_name(&self, name: &str) -> Result<Option<CardInfo>> {
        self.card_info(Selector::Name(name))
    }

    fn card_info(&self, card: Selector<'_>) -> Result<Option<CardInfo>> {
        self.with_session("card_info", |session| {
            session.fetch_record(|native, guard, callback| {
                native.get_card_info(guard, card, callback)
            })
        })
    }

    /// Lists every card.
    ///
    /// # Errors
    ///
    /// Fails if the context is not connected or the enumeration breaks off before it is complete.
    pub fn card_info_list(&self) -> Result<Vec<CardInfo>> {
        self.with_session("card_info_list", |session| {
            session.fetch_list(|native, guard, callback| native.get_card_info_list(guard, callback))
        })
    }

    /// Switches a card, selected by index or name, to the profile called `profile`.
    ///
    /// # Errors
    ///
    /// Fails if the server refuses, for example because the profile is unavailable.
    pub fn set_card_profile<'s>(&self, card: impl Into<Selector<'s>>, profile: &str) -> Result<()> {
        let card = card.into();

        self.with_session("set_card_profile", |session| {
            session.mutate(|native, guard, callback| {
                native.set_card_profile(guard, card, profile, callback)
            })
        })
    }

    /// Sets the latency offset of `port` on the card called `card`, in microseconds.
    ///
    /// Unlike the other card operations, the card can only be selected by name.
    ///
    /// # Errors
    ///
    /// Fails if the server refuses, for example because the port does not exist.
    pub fn set_port_latency_offset(&self, card: &str, port: &str, offset_usec: i64) -> Result<()> {
        self.with_session("set_port_latency_offset", |session| {
            session.mutate(|native, guard, callback| {
                native.set_port_latency_offset(guard, card, port, offset_usec, callback)
            })
        })
    }
}
