pub mod echo;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod scraper;
pub mod search;

pub use echo::EchoTool;
pub use executor::ToolExecutor;
pub use registry::{Registry, Tool};
pub use schema::{ArgSpec, ArgumentSchema, ItemSpec, JsonType};
pub use scraper::{Document, DocumentMetadata, WebsiteScrapperTool, WEBSITE_SCRAPPER};
pub use search::{
    InternetAnswerTool, InternetSearchTool, SearchHit, TavilyClient, INTERNET_ANSWER,
    INTERNET_SEARCH,
};
