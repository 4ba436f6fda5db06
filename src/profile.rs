// Profiles and dashboards
// Profile edits go through explicit per-structure merges; only the fields listed in the patch
// types can change. Host aggregates are recomputed from the records on every profile read.

use crate::clock::Clock;
use crate::config::ServiceConfig;
use crate::error::{BookingError, EntityKind, Result};
use crate::models::{
    Address, Booking, BookingStatus, Currency, Gender, HostInfo, Language, ListingSummary,
    Preferences, Principal, ResponseTime, Role, User, UserId, Verification,
};
use crate::rating::{HostStats, RatingAggregator};
use crate::store::EntityStore;
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub user: User,
    pub host_stats: Option<HostStats>,
    pub booking_stats: BTreeMap<BookingStatus, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NotificationPatch {
    pub email: Option<bool>,
    pub sms: Option<bool>,
    pub push: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreferencesPatch {
    pub currency: Option<Currency>,
    pub language: Option<Language>,
    pub notifications: Option<NotificationPatch>,
}

// Derived host aggregates are deliberately absent
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HostInfoPatch {
    pub response_rate: Option<u8>,
    pub response_time: Option<ResponseTime>,
}

impl HostInfoPatch {
    pub fn validate(&self) -> Result<()> {
        if self.response_rate.map_or(false, |rate| rate > 100) {
            return Err(BookingError::validation(
                "Response rate must be between 0 and 100",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub bio: Option<String>,
    pub languages: Option<Vec<String>>,
    pub address: Option<Address>,
    pub preferences: Option<PreferencesPatch>,
    pub host_info: Option<HostInfoPatch>,
}

pub fn merge_address(current: &mut Address, patch: Address) {
    let Address {
        street,
        city,
        state,
        country,
        zip_code,
    } = patch;
    for (slot, value) in [
        (&mut current.street, street),
        (&mut current.city, city),
        (&mut current.state, state),
        (&mut current.country, country),
        (&mut current.zip_code, zip_code),
    ] {
        if value.is_some() {
            *slot = value;
        }
    }
}

pub fn merge_preferences(current: &mut Preferences, patch: PreferencesPatch) {
    if let Some(currency) = patch.currency {
        current.currency = currency;
    }
    if let Some(language) = patch.language {
        current.language = language;
    }
    if let Some(notifications) = patch.notifications {
        let settings = &mut current.notifications;
        settings.email = notifications.email.unwrap_or(settings.email);
        settings.sms = notifications.sms.unwrap_or(settings.sms);
        settings.push = notifications.push.unwrap_or(settings.push);
    }
}

/// Callers validate the patch first.
pub fn merge_host_info(current: &mut HostInfo, patch: HostInfoPatch) {
    if let Some(rate) = patch.response_rate {
        current.response_rate = rate;
    }
    if let Some(response_time) = patch.response_time {
        current.response_time = response_time;
    }
}

impl ProfileUpdate {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(BookingError::validation("Name cannot be empty"));
            }
        }
        match &self.host_info {
            Some(host_info) => host_info.validate(),
            None => Ok(()),
        }
    }

    fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name.trim().to_string();
        }
        if self.phone.is_some() {
            user.phone = self.phone;
        }
        if let Some(avatar) = self.avatar {
            user.avatar = avatar;
        }
        if self.date_of_birth.is_some() {
            user.date_of_birth = self.date_of_birth;
        }
        if self.gender.is_some() {
            user.gender = self.gender;
        }
        if self.bio.is_some() {
            user.bio = self.bio;
        }
        if let Some(languages) = self.languages {
            user.languages = languages;
        }
        if let Some(address) = self.address {
            merge_address(&mut user.address, address);
        }
        if let Some(preferences) = self.preferences {
            merge_preferences(&mut user.preferences, preferences);
        }
        if let Some(host_info) = self.host_info {
            if user.role == Role::Host {
                merge_host_info(&mut user.host_info, host_info);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Email,
    Phone,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicProfile {
    pub id: UserId,
    pub name: String,
    pub avatar: String,
    pub bio: Option<String>,
    pub languages: Vec<String>,
    pub verified: Verification,
    pub role: Role,
    pub host_info: Option<HostInfo>,
    pub created_at: DateTime<Utc>,
    pub listings: Vec<ListingSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyBookings {
    pub year: i32,
    pub month: u32,
    pub count: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostDashboard {
    pub total_listings: usize,
    pub total_bookings: usize,
    // Oldest month first
    pub monthly: Vec<MonthlyBookings>,
    pub recent: Vec<Booking>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuestDashboard {
    pub total_bookings: usize,
    pub upcoming: Vec<Booking>,
    pub recent: Vec<Booking>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Dashboard {
    Host(HostDashboard),
    Guest(GuestDashboard),
}

fn newest_first(mut bookings: Vec<Booking>, limit: usize) -> Vec<Booking> {
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    bookings.truncate(limit);
    bookings
}

pub struct ProfileService {
    store: Arc<dyn EntityStore>,
    aggregator: Arc<RatingAggregator>,
    clock: Arc<dyn Clock>,
    config: Arc<ServiceConfig>,
}

impl ProfileService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        aggregator: Arc<RatingAggregator>,
        clock: Arc<dyn Clock>,
        config: Arc<ServiceConfig>,
    ) -> Self {
        Self {
            store,
            aggregator,
            clock,
            config,
        }
    }

    async fn load_user(&self, user_id: UserId) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| BookingError::not_found(EntityKind::User, user_id))
    }

    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn get_profile(&self, principal: &Principal) -> Result<Profile> {
        let mut user = self.load_user(principal.id).await?;

        let host_stats = if user.role == Role::Host {
            let stats = self.aggregator.refresh_host_stats(user.id).await?;
            user.host_info.total_listings = stats.total_listings;
            user.host_info.total_bookings = stats.total_bookings;
            user.host_info.host_rating = stats.host_rating;
            Some(stats)
        } else {
            None
        };

        let mut booking_stats = BTreeMap::new();
        for booking in self.store.bookings_for_user(user.id).await? {
            *booking_stats.entry(booking.status).or_insert(0) += 1;
        }

        Ok(Profile {
            user,
            host_stats,
            booking_stats,
        })
    }

    #[instrument(skip(self, update), fields(user_id = %principal.id))]
    pub async fn update_profile(&self, principal: &Principal, update: ProfileUpdate) -> Result<User> {
        update.validate()?;
        let user = self.load_user(principal.id).await?;
        if update.host_info.is_some() && user.role != Role::Host {
            debug!("Ignoring host info update for non-host");
        }

        let now = self.clock.now();
        let updated = self
            .store
            .update_user(
                principal.id,
                Box::new(move |user: &mut User| {
                    update.apply(user);
                    user.updated_at = now;
                }),
            )
            .await?;
        info!("Profile updated");
        Ok(updated)
    }

    pub async fn public_profile(&self, user_id: UserId) -> Result<PublicProfile> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| BookingError::not_found(EntityKind::User, user_id))?;

        let (host_info, listings) = if user.role == Role::Host {
            let mut listings = self.store.listings_by_host(user.id).await?;
            listings.retain(|l| l.is_active);
            listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let summaries = listings
                .iter()
                .take(self.config.public_profile_listing_limit)
                .map(|l| l.summary())
                .collect();
            (Some(user.host_info.clone()), summaries)
        } else {
            (None, Vec::new())
        };

        Ok(PublicProfile {
            id: user.id,
            name: user.name,
            avatar: user.avatar,
            bio: user.bio,
            languages: user.languages,
            verified: user.verified,
            role: user.role,
            host_info,
            created_at: user.created_at,
            listings,
        })
    }

    pub async fn set_contact_verified(
        &self,
        principal: &Principal,
        contact: ContactKind,
        verified: bool,
    ) -> Result<User> {
        let now = self.clock.now();
        let user = self
            .store
            .update_user(
                principal.id,
                Box::new(move |user: &mut User| {
                    match contact {
                        ContactKind::Email => user.verified.email = verified,
                        ContactKind::Phone => user.verified.phone = verified,
                    }
                    user.updated_at = now;
                }),
            )
            .await?;
        info!(user_id = %principal.id, ?contact, verified, "Contact verification updated");
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn dashboard(&self, principal: &Principal) -> Result<Dashboard> {
        if principal.role == Role::Host {
            self.host_dashboard(principal.id).await.map(Dashboard::Host)
        } else {
            self.guest_dashboard(principal.id).await.map(Dashboard::Guest)
        }
    }

    async fn host_dashboard(&self, host_id: UserId) -> Result<HostDashboard> {
        let listings = self.store.listings_by_host(host_id).await?;
        let listing_ids: Vec<_> = listings.iter().map(|l| l.id).collect();
        let bookings = self.store.bookings_for_listings(&listing_ids).await?;

        let now = self.clock.now();
        let since = now
            .checked_sub_months(Months::new(self.config.dashboard_history_months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut monthly: BTreeMap<(i32, u32), MonthlyBookings> = BTreeMap::new();
        for booking in bookings.iter().filter(|b| b.created_at >= since) {
            let (year, month) = (booking.created_at.year(), booking.created_at.month());
            let entry = monthly.entry((year, month)).or_insert(MonthlyBookings {
                year,
                month,
                count: 0,
                revenue: 0.0,
            });
            entry.count += 1;
            entry.revenue += booking.total_price;
        }

        Ok(HostDashboard {
            total_listings: listings.iter().filter(|l| l.is_active).count(),
            total_bookings: bookings.len(),
            monthly: monthly.into_values().collect(),
            recent: newest_first(bookings, self.config.dashboard_recent_limit),
        })
    }

    async fn guest_dashboard(&self, user_id: UserId) -> Result<GuestDashboard> {
        let bookings = self.store.bookings_for_user(user_id).await?;
        let today = self.clock.today();

        let mut upcoming: Vec<Booking> = bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Confirmed && b.check_in >= today)
            .cloned()
            .collect();
        upcoming.sort_by_key(|b| b.check_in);
        upcoming.truncate(self.config.dashboard_upcoming_limit);

        Ok(GuestDashboard {
            total_bookings: bookings.len(),
            upcoming,
            recent: newest_first(bookings, self.config.dashboard_recent_limit),
        })
    }
}
