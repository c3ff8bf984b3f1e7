mod approval;
mod common;
mod matching;
mod routing;
