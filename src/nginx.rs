//! nginx virtual-host files written to a freshly provisioned
//! instance.

pub const SITES_AVAILABLE: &str = "/etc/nginx/sites-available";
pub const SITES_ENABLED: &str = "/etc/nginx/sites-enabled";

/// Catch-all server: redirects plain HTTP to HTTPS and terminates
/// TLS with the certificate issued for `domain`.
#[must_use]
pub fn render_default(domain: &str, upstream_port: u16) -> String {
    format!(
        "server {{
    listen 80 default_server;
    listen [::]:80 default_server;

    root /var/www/html;
    index index.html index.htm index.nginx-debian.html;

    server_name {domain};

    location / {{
        try_files $uri $uri/ @proxy;
    }}

    location @proxy {{
        proxy_pass http://localhost:{upstream_port};
    }}

    return 301 https://$server_name$request_uri;
}}

server {{
    listen 443 ssl;
    server_name {domain};

    ssl_certificate /etc/letsencrypt/live/{domain}/fullchain.pem;
    ssl_certificate_key /etc/letsencrypt/live/{domain}/privkey.pem;

    location / {{
        proxy_pass http://localhost:{upstream_port};
    }}
}}
"
    )
}

/// Site-specific reverse proxy for `domain`.
#[must_use]
pub fn render_site(domain: &str, upstream_port: u16) -> String {
    format!(
        "server {{
    listen 80;
    server_name {domain};

    location / {{
        proxy_pass http://localhost:{upstream_port};
    }}

    return 301 https://$server_name$request_uri;
}}

server {{
    listen 443 ssl;
    server_name {domain};

    ssl_certificate /etc/letsencrypt/live/{domain}/fullchain.pem;
    ssl_certificate_key /etc/letsencrypt/live/{domain}/privkey.pem;

    location / {{
        proxy_pass http://localhost:{upstream_port};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }}
}}
"
    )
}

#[must_use]
pub fn default_path() -> String {
    format!("{SITES_AVAILABLE}/default")
}

#[must_use]
pub fn site_path(domain: &str) -> String {
    format!("{SITES_AVAILABLE}/{domain}")
}

#[must_use]
pub fn enabled_path(domain: &str) -> String {
    format!("{SITES_ENABLED}/{domain}")
}
