use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::configuration::JwtSettings;
use crate::email_client::EmailClient;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    assign_role, confirm_password_reset, create_user, delete_user, get_user, health_check,
    list_role_members, list_users, login, profile, refresh, remove_role_member,
    request_password_reset, update_user, RoleKind,
};

fn role_scope(path: &str, kind: RoleKind) -> actix_web::Scope {
    web::scope(path)
        .app_data(web::Data::new(kind))
        .route("", web::post().to(assign_role))
        .route("", web::get().to(list_role_members))
        .route("/{id}", web::delete().to(remove_role_member))
}

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    jwt_config: JwtSettings,
    email_client: EmailClient,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let jwt_config_data = web::Data::new(jwt_config.clone());
    let email_client = web::Data::new(email_client);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(connection.clone())
            .app_data(jwt_config_data.clone())
            .app_data(email_client.clone())

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))

            // Protected routes (require a valid access token)
            .service(
                web::scope("/auth")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("/profile", web::get().to(profile)),
            )

            // User directory; fixed paths before the {user_id} matchers
            .route("/users/password-reset-request", web::post().to(request_password_reset))
            .route("/users/password-reset", web::post().to(confirm_password_reset))
            .route("/users", web::post().to(create_user))
            .route("/users", web::get().to(list_users))
            .route("/users/{user_id}", web::get().to(get_user))
            .route("/users/{user_id}", web::put().to(update_user))
            .route("/users/{user_id}", web::delete().to(delete_user))

            // Role membership
            .service(role_scope("/administrators", RoleKind::Administrator))
            .service(role_scope("/professors", RoleKind::Professor))
            .service(role_scope("/students", RoleKind::Student))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
