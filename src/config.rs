use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Credentials and addressing for the remote media host (S3 or MinIO).
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub public_url: Option<String>,
}

impl MediaConfig {
    /// Base URL under which uploaded objects are publicly reachable.
    pub fn public_base_url(&self) -> String {
        if let Some(url) = &self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub media: Option<MediaConfig>,
    pub smtp: Option<SmtpConfig>,
    pub frontend_url: String,
    pub production: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: get("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "skillshare".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "skillshare-users".into()),
        };

        let media = match (
            get("MEDIA_ACCESS_KEY"),
            get("MEDIA_SECRET_KEY"),
            get("MEDIA_BUCKET"),
        ) {
            (Some(access_key), Some(secret_key), Some(bucket)) => Some(MediaConfig {
                access_key,
                secret_key,
                bucket,
                endpoint: get("MEDIA_ENDPOINT"),
                region: get("MEDIA_REGION").unwrap_or_else(|| "us-east-1".into()),
                public_url: get("MEDIA_PUBLIC_URL"),
            }),
            _ => None,
        };

        let smtp = match (get("SMTP_HOST"), get("SMTP_USERNAME"), get("SMTP_PASSWORD")) {
            (Some(host), Some(username), Some(password)) => {
                let port = match get("SMTP_PORT") {
                    Some(raw) => raw
                        .parse::<u16>()
                        .with_context(|| format!("SMTP_PORT is not a port number: {raw}"))?,
                    None => 587,
                };
                let from = get("SMTP_FROM").unwrap_or_else(|| format!("SkillShare <{username}>"));
                Some(SmtpConfig {
                    host,
                    port,
                    username,
                    password,
                    from,
                })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            jwt,
            media,
            smtp,
            frontend_url: get("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".into()),
            production: get("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production")),
        })
    }
}
