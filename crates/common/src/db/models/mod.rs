//! SeaORM entity models
//!
//! Database entities for the Seatwise booking core

mod booking;
mod booking_seat;
mod discount_code;
mod hall;
mod loyalty_account;
mod movie;
mod seat;
mod showtime;

pub use booking::{
    ActiveModel as BookingActiveModel,
    BookingStatus,
    Column as BookingColumn,
    Entity as BookingEntity,
    Model as Booking,
};

pub use booking_seat::{
    ActiveModel as BookingSeatActiveModel,
    Column as BookingSeatColumn,
    Entity as BookingSeatEntity,
    Model as BookingSeat,
};

pub use discount_code::{
    ActiveModel as DiscountCodeActiveModel,
    Column as DiscountCodeColumn,
    DiscountType,
    Entity as DiscountCodeEntity,
    Model as DiscountCode,
};

pub use hall::{
    ActiveModel as HallActiveModel,
    Column as HallColumn,
    Entity as HallEntity,
    Model as Hall,
};

pub use loyalty_account::{
    ActiveModel as LoyaltyAccountActiveModel,
    Column as LoyaltyAccountColumn,
    Entity as LoyaltyAccountEntity,
    Model as LoyaltyAccount,
};

pub use movie::{
    ActiveModel as MovieActiveModel,
    Column as MovieColumn,
    Entity as MovieEntity,
    Model as Movie,
};

pub use seat::{
    ActiveModel as SeatActiveModel,
    Column as SeatColumn,
    Entity as SeatEntity,
    Model as Seat,
    SeatStatus,
};

pub use showtime::{
    ActiveModel as ShowtimeActiveModel,
    Column as ShowtimeColumn,
    Entity as ShowtimeEntity,
    Model as Showtime,
};
