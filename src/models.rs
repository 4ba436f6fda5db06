// Domain records for the homestay marketplace
// Listings, bookings, reviews and users are independent records that only reference each other by id.

use crate::availability::StayRange;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ListingId = Uuid;
pub type BookingId = Uuid;
pub type ReviewId = Uuid;
pub type UserId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Host,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

/// Authenticated caller, supplied by the identity layer and trusted as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    // Owner of the record, or an admin acting on their behalf
    pub fn owns_or_admin(&self, owner: UserId) -> bool {
        self.id == owner || self.is_admin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amenity {
    Wifi,
    Pool,
    Parking,
    AirConditioning,
    Tv,
    Kitchen,
    WashingMachine,
    Garden,
    Balcony,
    Elevator,
    Gym,
    Bbq,
    Fireplace,
    Jacuzzi,
    Sauna,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingImage {
    pub url: String,
    pub alt: String,
}

impl ListingImage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alt: "Homestay image".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub host_id: UserId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub address: String,
    pub coordinates: Option<Coordinates>,
    pub price_per_night: f64,
    pub max_guests: u32,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub amenities: Vec<Amenity>,
    pub images: Vec<ListingImage>,
    pub is_active: bool,
    // Derived from reviews; written only by the rating aggregator
    pub average_rating: f64,
    pub total_reviews: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn summary(&self) -> ListingSummary {
        ListingSummary {
            id: self.id,
            title: self.title.clone(),
            location: self.location.clone(),
            price_per_night: self.price_per_night,
            max_guests: self.max_guests,
            average_rating: self.average_rating,
            total_reviews: self.total_reviews,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub id: ListingId,
    pub title: String,
    pub location: String,
    pub price_per_night: f64,
    pub max_guests: u32,
    pub average_rating: f64,
    pub total_reviews: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
    ];

    /// Pending and confirmed bookings hold their dates; nothing else does.
    pub fn is_occupying(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    BankTransfer,
    Cash,
    EWallet,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::CreditCard
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub listing_id: ListingId,
    pub user_id: UserId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
    pub total_price: f64,
    pub payment_method: PaymentMethod,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

impl Booking {
    pub fn stay(&self) -> StayRange {
        StayRange::from_stored(self.check_in, self.check_out)
    }

    pub fn window(&self) -> BookingWindow {
        BookingWindow {
            booking_id: self.id,
            check_in: self.check_in,
            check_out: self.check_out,
            status: self.status,
        }
    }
}

/// The dates a booking holds, as reported back in conflict errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWindow {
    pub booking_id: BookingId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub listing_id: ListingId,
    pub user_id: UserId,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub email: bool,
    pub phone: bool,
    pub identity: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseTime {
    WithinAnHour,
    WithinAFewHours,
    WithinADay,
    AFewDaysOrMore,
}

impl Default for ResponseTime {
    fn default() -> Self {
        ResponseTime::WithinADay
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    pub joined_date: DateTime<Utc>,
    // Cached host aggregates, refreshed on profile read
    pub total_listings: u32,
    pub total_bookings: u32,
    pub host_rating: f64,
    pub response_rate: u8,
    pub response_time: ResponseTime,
}

impl HostInfo {
    pub fn new(joined_date: DateTime<Utc>) -> Self {
        Self {
            joined_date,
            total_listings: 0,
            total_bookings: 0,
            host_rating: 0.0,
            response_rate: 0,
            response_time: ResponseTime::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "VND")]
    Vnd,
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Vnd
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Vi,
    En,
}

impl Default for Language {
    fn default() -> Self {
        Language::Vi
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub email: bool,
    pub sms: bool,
    pub push: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email: true,
            sms: false,
            push: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub currency: Currency,
    pub language: Language,
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub address: Address,
    pub bio: Option<String>,
    pub languages: Vec<String>,
    pub verified: Verification,
    pub role: Role,
    pub host_info: HostInfo,
    pub preferences: Preferences,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_AVATAR: &str = "https://via.placeholder.com/150/cccccc/969696?text=Avatar";

impl User {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            phone: None,
            avatar: DEFAULT_AVATAR.to_string(),
            date_of_birth: None,
            gender: None,
            address: Address::default(),
            bio: None,
            languages: Vec::new(),
            verified: Verification::default(),
            role,
            host_info: HostInfo::new(now),
            preferences: Preferences::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.role)
    }
}
