use anyhow::Context;

/// Resolves `relative` against the location of `base` (a file path or URL).
///
/// Absolute URLs and absolute paths are returned unchanged.
pub fn resolve_relative(base: &str, relative: &str) -> String {
    if relative.contains("://") || relative.starts_with('/') || relative.starts_with("data:") {
        return relative.to_string();
    }
    match base.rfind(['/', '\\']) {
        Some(idx) => format!("{}/{}", &base[..idx], relative),
        None => relative.to_string(),
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no window available to resolve model URLs")?;
    let href = window
        .location()
        .href()
        .map_err(|e| anyhow::anyhow!("cannot read the page location: {:?}", e))?;
    let base = reqwest::Url::parse(&href)?;
    Ok(base.join(file_name)?)
}

pub async fn load_binary(location: &str) -> anyhow::Result<Vec<u8>> {
    if location.starts_with("data:") {
        anyhow::bail!("embedded data URIs are not supported");
    }
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(location)?;
        reqwest::get(url)
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = std::fs::read(location).with_context(|| format!("cannot read {}", location))?;

    Ok(data)
}

pub async fn load_string(location: &str) -> anyhow::Result<String> {
    let data = load_binary(location).await?;
    String::from_utf8(data).with_context(|| format!("{} is not valid UTF-8", location))
}
