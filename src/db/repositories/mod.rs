pub mod cameras;
pub mod slots;
pub mod users;

pub use cameras::CamerasRepository;
pub use slots::SlotsRepository;
pub use users::UsersRepository;
