use crate::core::config::data::{path_display, Config};

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.default_model {
            Some(model) => println!("  default-model: {model}"),
            None => println!("  default-model: (unset)"),
        }
        match &self.default_provider {
            Some(provider) => println!("  default-provider: {provider}"),
            None => println!("  default-provider: (unset)"),
        }
        if self.providers.is_empty() {
            println!("  providers: (none configured)");
        } else {
            println!("  providers:");
            for (id, provider) in &self.providers {
                let key = if provider.api_key.is_some() {
                    "key set"
                } else {
                    "no key"
                };
                match &provider.base_url {
                    Some(url) => println!("    {id}: {key}, base url {url}"),
                    None => println!("    {id}: {key}"),
                }
            }
        }
        if !self.template_dirs.is_empty() {
            println!("  template-dirs:");
            for dir in &self.template_dirs {
                println!("    {}", path_display(dir));
            }
        }
    }
}
