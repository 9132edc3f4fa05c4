// 外部协作方：资产服务、内容读取、对象存储、宿主 UI

pub mod client;
pub mod content;
pub mod transfer;
pub mod types;
pub mod ui;

pub use client::{AssetClient, AssetService};
pub use content::{content_type_for, ContentSource, LocalFileSource};
pub use transfer::{HttpObjectStore, ObjectStore};
pub use types::*;
pub use ui::{ConsoleUi, HostUi};
