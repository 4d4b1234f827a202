use std::net::TcpListener;

use actix_files::Files;
use actix_web::{
    dev::Server,
    middleware::Logger,
    web::{self, Data},
    App, HttpServer,
};

use crate::{
    routes::{default_route, scrape_route, status_route},
    services::{JobTracker, SearchQuerySender},
};

pub fn run(
    listener: TcpListener,
    tracker: Data<JobTracker>,
    query_sender: SearchQuerySender,
) -> Result<Server, std::io::Error> {
    let query_sender = web::Data::new(query_sender);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(Files::new("/static", "./templates/static").prefer_utf8(true))
            .service(default_route::default)
            .service(
                web::scope("/app")
                    .service(scrape_route::start_scrape)
                    .service(status_route::status),
            )
            .app_data(tracker.clone())
            .app_data(query_sender.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
