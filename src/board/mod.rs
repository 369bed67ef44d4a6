pub mod logos;
pub mod state;
pub mod table;

pub use logos::{LogoResolver, LogoSource};
pub use state::{dispatch, render, Action, AppState, BoardView, FetchRequest, LoadStatus};
pub use table::{render_table, BoardRow, BoardTable, RenderOptions};
