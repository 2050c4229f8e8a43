mod action;
mod conditional;
mod markup;
mod passage;
mod prescan;

pub use action::{parse_action, ParamBag};
pub use conditional::{evaluate_body, leading_condition, resolve_conditionals, Evaluation};
pub use markup::{parse_choice, parse_condition, tokenize_body, TokenizedBody};
pub use passage::{split_passages, Passage, SplitPassages};
pub use prescan::{parse_set_body, prescan_variables};
